//! # Logging モジュール
//!
//! 回避シミュレーションのログ管理機能を提供します。
//!
//! tracing-appender による非同期ファイル出力とコンソール出力を組み合わせ、
//! ティックごとの処理速度に影響を与えずに構造化ログを残します。
//!
//! ## 設定可能な出力先
//!
//! - `Console`: コンソールのみ（compact 形式）
//! - `File`: ファイルのみ（logs/evader.YYYY-MM-DD, JSON 形式）
//! - `Both`: コンソールとファイルの両方

use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};

/// ログ出力先の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogOutput {
    /// コンソールのみ
    Console,
    /// ファイルのみ
    File,
    /// コンソールとファイルの両方
    Both,
}

impl LogOutput {
    pub fn writes_file(&self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(format!("無効な出力先: {}. 利用可能: console, file, both", s)),
        }
    }
}

/// ログ設定構造体
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル
    pub level: Level,
    /// 出力先
    pub output: LogOutput,
    /// ログファイルのディレクトリ（File または Both の場合）
    pub log_dir: String,
    /// ログファイル名のプレフィックス
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            log_dir: "logs".to_string(),
            file_prefix: "evader".to_string(),
        }
    }
}

/// ログシステムを初期化
///
/// `RUST_LOG` が設定されていればそれを優先し、なければ `config.level` を使います。
///
/// # 戻り値
///
/// ファイル出力がある場合は非同期書き込みのガード。呼び出し側はプログラム終了まで
/// 保持してください（破棄するとバッファが書き出されて書き込みスレッドが止まります）。
///
/// # 例
///
/// ```no_run
/// use evader::logging::{LogConfig, LogOutput, init_logging};
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     output: LogOutput::Both,
///     ..LogConfig::default()
/// };
///
/// let _guard = init_logging(config).expect("ログ初期化に失敗");
/// ```
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>, TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = || {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
    };

    match config.output {
        LogOutput::Console => {
            Registry::default()
                .with(env_filter)
                .with(console_layer())
                .try_init()?;
            Ok(None)
        }
        LogOutput::File | LogOutput::Both => {
            // 非同期ファイル出力（日次ローテーション）
            let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
            let (non_blocking_appender, guard) = non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking_appender)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json();

            let console = (config.output == LogOutput::Both).then(console_layer);
            Registry::default()
                .with(env_filter)
                .with(console)
                .with(file_layer)
                .try_init()?;
            Ok(Some(guard))
        }
    }
}

/// ログレベルを文字列から解析
///
/// # 戻り値
///
/// 解析されたログレベル、無効な場合はINFO
pub fn parse_log_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("警告: 無効なログレベル '{}'. INFOを使用します", level_str);
            Level::INFO
        }
    }
}

/// `-v` の指定回数からログレベルを決定
///
/// 0回: INFO, 1回: DEBUG, 2回以上: TRACE
pub fn verbosity_to_level(verbose_level: u8) -> Level {
    match verbose_level {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// コマンドラインの指定からログレベルを決定
///
/// 明示的なレベル指定があれば `-v` の回数より優先します。
pub fn resolve_log_level(explicit: Option<&str>, verbose_level: u8) -> Level {
    explicit
        .map(parse_log_level)
        .unwrap_or_else(|| verbosity_to_level(verbose_level))
}

/// ログディレクトリを作成
pub fn ensure_log_directory(log_dir: &str) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(log_dir)?;
    Ok(())
}
