//! # Input モジュール
//!
//! 一時停止・終了の入力イベントと、その供給源の抽象を提供します。
//! イベントはループの各量子の終わり（フレーム待機の直後）に取り込まれます。

use std::collections::VecDeque;

use tracing::debug;

/// ループへの入力イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// 生のキー入力（`KeyBindings` で解決される）
    KeyPress(String),
    TogglePause,
    Exit,
}

/// キー割り当て
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    pub pause_keys: Vec<String>,
    pub exit_keys: Vec<String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            pause_keys: vec![" ".to_string()],
            exit_keys: vec!["escape".to_string()],
        }
    }
}

impl KeyBindings {
    /// キーに割り当てられたイベント。未割り当てなら `None`
    pub fn resolve(&self, key: &str) -> Option<InputEvent> {
        if self.pause_keys.iter().any(|k| k == key) {
            Some(InputEvent::TogglePause)
        } else if self.exit_keys.iter().any(|k| k == key) {
            Some(InputEvent::Exit)
        } else {
            None
        }
    }
}

/// 入力源のインターフェース
pub trait IInputSource {
    /// 前回の呼び出し以降に発生したイベントを取り出す
    fn poll(&mut self) -> Vec<InputEvent>;
}

/// 何も入力しない入力源（バッチ実行用）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl IInputSource for NoInput {
    fn poll(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }
}

/// 量子番号を指定してイベントを発生させる入力源
///
/// `frame` 番目（0始まり）の `poll()` で該当イベントを返します。
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    frame: u64,
    pending: VecDeque<(u64, InputEvent)>,
}

impl ScriptedInput {
    pub fn new(mut script: Vec<(u64, InputEvent)>) -> Self {
        script.sort_by_key(|(frame, _)| *frame);
        Self {
            frame: 0,
            pending: script.into(),
        }
    }

    /// 未発生のイベント数
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl IInputSource for ScriptedInput {
    fn poll(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        while let Some((frame, _)) = self.pending.front() {
            if *frame > self.frame {
                break;
            }
            if let Some((_, event)) = self.pending.pop_front() {
                debug!(frame = self.frame, ?event, "スクリプト入力");
                events.push(event);
            }
        }
        self.frame += 1;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.resolve(" "), Some(InputEvent::TogglePause));
        assert_eq!(bindings.resolve("escape"), Some(InputEvent::Exit));
        assert_eq!(bindings.resolve("q"), None);
    }

    #[test]
    fn test_scripted_input_emits_by_frame() {
        let mut input = ScriptedInput::new(vec![
            (2, InputEvent::Exit),
            (0, InputEvent::TogglePause),
        ]);
        assert_eq!(input.poll(), vec![InputEvent::TogglePause]);
        assert!(input.poll().is_empty());
        assert_eq!(input.poll(), vec![InputEvent::Exit]);
        assert_eq!(input.remaining(), 0);
        assert!(input.poll().is_empty());
    }
}
