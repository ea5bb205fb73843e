//! # Render モジュール
//!
//! 描画面（プロット面）の抽象インターフェースと、ヘッドレス実装を提供します。
//!
//! エンティティは毎ティック `erase()` → `draw()` の順で呼ばれ、前回描画した
//! アーティスト（マーカーや円）を自分で保持し、消去時に描画面から取り除きます。
//! 実際のグラフィック出力はこのクレートの範囲外で、`HeadlessSurface` は
//! 描画要求を記録して trace ログに出すだけです。

use std::collections::BTreeMap;

use crate::models::common::Vector2;
use tracing::trace;

/// 描画面上のアーティストを指すハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtistHandle(pub u64);

/// マーカーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// 飛行中の航空機（青三角）
    Aircraft,
    /// 撃墜された航空機（黒三角）
    AircraftDestroyed,
    /// 航空機の目的地（赤丸）
    Waypoint,
    /// 飛翔中のミサイル（赤星）
    Missile,
    /// 自爆したミサイル（黒星）
    MissileInert,
    /// ミサイルシステム（緑四角）
    Launcher,
}

/// 描画済みのアーティスト
#[derive(Debug, Clone, PartialEq)]
pub enum Artist {
    Marker { position: Vector2, marker: Marker },
    Circle { center: Vector2, radius: f64 },
}

/// 描画面のインターフェース
pub trait IRenderSurface {
    /// マーカーを描画
    fn plot_marker(&mut self, position: Vector2, marker: Marker) -> ArtistHandle;

    /// 円（爆発範囲）を描画
    fn plot_circle(&mut self, center: Vector2, radius: f64) -> ArtistHandle;

    /// アーティストを消去
    fn remove(&mut self, handle: ArtistHandle);

    /// タイトルを設定
    fn set_title(&mut self, title: &str);
}

/// ハンドル群をまとめて消去
pub fn remove_artists(surface: &mut dyn IRenderSurface, artists: &mut Vec<ArtistHandle>) {
    for handle in artists.drain(..) {
        surface.remove(handle);
    }
}

/// 画面を持たない描画面
///
/// 現在表示中のアーティストとタイトルを保持します。テストやバッチ実行で使用します。
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    artists: BTreeMap<ArtistHandle, Artist>,
    next_handle: u64,
    title: String,
    draw_calls: u64,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 現在表示中のアーティスト
    pub fn artists(&self) -> impl Iterator<Item = &Artist> {
        self.artists.values()
    }

    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// 累計の描画要求数
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    fn insert(&mut self, artist: Artist) -> ArtistHandle {
        let handle = ArtistHandle(self.next_handle);
        self.next_handle += 1;
        self.draw_calls += 1;
        trace!(handle = handle.0, ?artist, "描画");
        self.artists.insert(handle, artist);
        handle
    }
}

impl IRenderSurface for HeadlessSurface {
    fn plot_marker(&mut self, position: Vector2, marker: Marker) -> ArtistHandle {
        self.insert(Artist::Marker { position, marker })
    }

    fn plot_circle(&mut self, center: Vector2, radius: f64) -> ArtistHandle {
        self.insert(Artist::Circle { center, radius })
    }

    fn remove(&mut self, handle: ArtistHandle) {
        self.artists.remove(&handle);
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }
}
