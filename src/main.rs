use clap::{Arg, ArgMatches, Command, value_parser};
use evader::input::ScriptedInput;
use evader::logging::{
    LogConfig, LogOutput, ensure_log_directory, init_logging, resolve_log_level,
};
use evader::render::HeadlessSurface;
use evader::scenario::{DemoKind, ScenarioConfig};
use evader::simulation::SimulationEngine;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("evader")
        .version("0.1.0")
        .about("ミサイル回避シミュレーション (Missile Evasion Simulation)")
        .long_about(
            "2次元平面上で航空機が地上発射ミサイルを回避する時間駆動シミュレーション\n\
             回避戦略（最接近距離最大化・燃料節約・次ステップ距離最大化）を比較します。",
        )
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .conflicts_with("demo"),
        )
        .arg(
            Arg::new("demo")
                .short('d')
                .long("demo")
                .value_name("NAME")
                .help("組み込みデモを実行 (noevasion, maxmindist, minfuel, maxnextdist)"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("tmax")
                .long("tmax")
                .value_name("T")
                .value_parser(value_parser!(f64))
                .help("終了時刻を上書き"),
        )
        .arg(
            Arg::new("dt")
                .long("dt")
                .value_name("DT")
                .value_parser(value_parser!(f64))
                .help("時間刻みを上書き"),
        )
        .arg(
            Arg::new("frame-time")
                .long("frame-time")
                .value_name("SECONDS")
                .value_parser(value_parser!(f64))
                .help("各量子の終わりに待機する実時間を上書き"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: 最適化の内部まで)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベルを指定 (trace, debug, info, warn, error)。-v より優先"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("OUTPUT")
                .default_value("console")
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルのディレクトリ"),
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    // ログ初期化（ガードは終了まで保持）
    let _log_guard = match setup_logging(&matches, verbose_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    let scenario = match load_scenario(&matches) {
        Ok(Some(scenario)) => scenario,
        Ok(None) => {
            show_default_help();
            return;
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = execute_scenario(scenario, matches.get_flag("info"), verbose_level) {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

fn setup_logging(
    matches: &ArgMatches,
    verbose_level: u8,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    let output: LogOutput = matches
        .get_one::<String>("log-output")
        .map(String::as_str)
        .unwrap_or("console")
        .parse()?;
    let log_dir = matches
        .get_one::<String>("log-dir")
        .cloned()
        .unwrap_or_else(|| "logs".to_string());

    if output.writes_file() {
        ensure_log_directory(&log_dir)?;
    }

    let level = resolve_log_level(
        matches.get_one::<String>("log-level").map(String::as_str),
        verbose_level,
    );

    let config = LogConfig {
        level,
        output,
        log_dir,
        ..LogConfig::default()
    };
    Ok(init_logging(config)?)
}

/// シナリオファイルまたはデモからシナリオを作成し、コマンドラインの上書きを反映
fn load_scenario(matches: &ArgMatches) -> Result<Option<ScenarioConfig>, Box<dyn std::error::Error>> {
    let mut scenario = if let Some(path) = matches.get_one::<String>("scenario") {
        ScenarioConfig::from_file(path)?
    } else if let Some(name) = matches.get_one::<String>("demo") {
        ScenarioConfig::demo(name.parse::<DemoKind>()?)
    } else {
        return Ok(None);
    };

    if let Some(&tmax) = matches.get_one::<f64>("tmax") {
        scenario.sim.t_max_s = tmax;
    }
    if let Some(&dt) = matches.get_one::<f64>("dt") {
        scenario.sim.dt_s = dt;
    }
    if let Some(&frame_time) = matches.get_one::<f64>("frame-time") {
        scenario.sim.frame_time_s = frame_time;
    }
    scenario.validate()?;

    Ok(Some(scenario))
}

/// シナリオの実行
fn execute_scenario(
    scenario: ScenarioConfig,
    info_only: bool,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    // 情報表示のみの場合
    if info_only {
        return Ok(());
    }

    let mut input: ScriptedInput = scenario.scripted_input();
    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    simulation.initialize()?;

    let mut surface = HeadlessSurface::new();
    let report = simulation.run(&mut surface, &mut input);
    report.print_summary();

    Ok(())
}

/// デフォルトヘルプとデモ一覧を表示
fn show_default_help() {
    println!("ミサイル回避シミュレーション - evader v0.1.0");
    println!();
    println!("使用方法:");
    println!("  evader [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>      シナリオファイルを指定して実行");
    println!("  -d, --demo <NAME>          組み込みデモを実行");
    println!("  -i, --info                 シナリオ情報のみ表示");
    println!("      --tmax <T>             終了時刻を上書き");
    println!("      --dt <DT>              時間刻みを上書き");
    println!("      --frame-time <SECONDS> フレーム待機時間を上書き");
    println!("  -v, --verbose              詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-level <LEVEL>    ログレベル (trace, debug, info, warn, error)");
    println!("      --log-output <OUTPUT>  ログ出力先 (console, file, both)");
    println!("  -h, --help                 このヘルプを表示");
    println!();
    println!("組み込みデモ:");
    for kind in DemoKind::ALL {
        println!("  {:<12} - {}", kind.name(), kind.description());
    }
    println!();
    println!("シナリオファイル:");
    for kind in DemoKind::ALL {
        println!("  scenarios/{}.yaml", kind.name());
    }
    println!();
    println!("例:");
    println!("  evader -d maxmindist");
    println!("  evader -s scenarios/minfuel.yaml -v --frame-time 0");
    println!("  evader -s scenarios/noevasion.yaml -i");
}
