//! # 幾何ユーティリティ
//!
//! 距離、方向を保ったままの成分クリップ、ベクトル間角度、
//! 等速直線運動する2点の最接近時刻・最接近距離を提供します。

use crate::models::common::Vector2;

/// ユークリッド距離
pub fn distance(a: Vector2, b: Vector2) -> f64 {
    (a - b).magnitude()
}

/// チェビシェフ距離（成分差の絶対値の最大）
pub fn chebyshev_distance(a: Vector2, b: Vector2) -> f64 {
    let d = (a - b).abs();
    d.x.max(d.y)
}

/// 方向を保ったまま各成分の絶対値を `xmax` 以下に縮める
///
/// `xmax` はスカラー（全軸共通）または軸ごとの上限ベクトル。いずれも非負であること。
/// 成分を順に走査し、現在の倍率 `k` で上限を超える成分があれば
/// `k = xmax_i / |x_i|` に更新します。`k` は 1 を超えません。
pub fn clamp_preserving_direction(x: Vector2, xmax: impl Into<Vector2>) -> Vector2 {
    let limits = xmax.into();
    let mut k = 1.0;
    for (component, limit) in x.components().into_iter().zip(limits.components()) {
        // 成分が0なら k*0 は上限を超えないので除算は発生しない
        if k * component.abs() > limit {
            k = limit / component.abs();
        }
    }
    x * k
}

/// 2ベクトル間の符号なし角度 [0, π]（ラジアン）
pub fn angle_between(u: Vector2, v: Vector2) -> f64 {
    u.cross(&v).abs().atan2(u.dot(&v))
}

/// 最接近時刻
///
/// 両者が現在の速度で等速直線運動すると仮定したとき、距離が最小となる時刻（現在からの相対時間）。
/// 相対速度が0の場合、距離は一定なので0を返します。
pub fn time_of_closest_approach(x1: Vector2, v1: Vector2, x2: Vector2, v2: Vector2) -> f64 {
    let dv = v1 - v2;
    let dvsq = dv.dot(&dv);
    if dvsq == 0.0 {
        return 0.0;
    }
    let dx = x1 - x2;
    -dv.dot(&dx) / dvsq
}

/// 最接近距離の2乗
///
/// 2次元専用の垂線距離公式。相対速度が0なら現在距離の2乗。
pub fn squared_min_distance(x1: Vector2, v1: Vector2, x2: Vector2, v2: Vector2) -> f64 {
    let dv = v1 - v2;
    let dvsq = dv.dot(&dv);
    let dx = x1 - x2;
    if dvsq == 0.0 {
        return dx.dot(&dx);
    }
    dv.cross(&dx).powi(2) / dvsq
}

/// 最接近距離
pub fn min_distance(x1: Vector2, v1: Vector2, x2: Vector2, v2: Vector2) -> f64 {
    squared_min_distance(x1, v1, x2, v2).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_distances() {
        let a = Vector2::new(1.0, 1.0);
        let b = Vector2::new(4.0, 5.0);
        assert_relative_eq!(distance(a, b), 5.0);
        assert_relative_eq!(chebyshev_distance(a, b), 4.0);
    }

    #[test]
    fn test_clamp_never_grows_and_keeps_direction() {
        let samples = [
            Vector2::new(30.0, -4.0),
            Vector2::new(-7.5, 22.0),
            Vector2::new(0.0, -50.0),
            Vector2::new(3.0, 2.0),
            Vector2::new(-100.0, -100.0),
        ];
        let limits = [Vector2::splat(15.0), Vector2::new(5.0, 20.0), Vector2::new(1.0, 0.5)];
        for x in samples {
            for xmax in limits {
                let clamped = clamp_preserving_direction(x, xmax);
                assert!(clamped.magnitude() <= x.magnitude() + 1e-12);
                assert!(clamped.x.abs() <= xmax.x + 1e-12);
                assert!(clamped.y.abs() <= xmax.y + 1e-12);
                // 非負スカラー倍であること
                assert_relative_eq!(x.cross(&clamped), 0.0, epsilon = 1e-9);
                assert!(x.dot(&clamped) >= 0.0);
            }
        }
    }

    #[test]
    fn test_clamp_matches_smallest_ratio() {
        let x = Vector2::new(30.0, -40.0);
        let clamped = clamp_preserving_direction(x, Vector2::new(20.0, 10.0));
        // min(20/30, 10/40) = 0.25
        assert_relative_eq!(clamped.x, 7.5);
        assert_relative_eq!(clamped.y, -10.0);
    }

    #[test]
    fn test_clamp_scalar_and_zero_component() {
        let clamped = clamp_preserving_direction(Vector2::new(0.0, 30.0), 15.0);
        assert_eq!(clamped, Vector2::new(0.0, 15.0));
        let untouched = clamp_preserving_direction(Vector2::new(3.0, -4.0), 15.0);
        assert_eq!(untouched, Vector2::new(3.0, -4.0));
        assert_eq!(clamp_preserving_direction(Vector2::ZERO, 0.0), Vector2::ZERO);
    }

    #[test]
    fn test_angle_between() {
        let up = Vector2::new(0.0, 1.0);
        assert_relative_eq!(angle_between(up, Vector2::new(1.0, 0.0)), PI / 2.0);
        assert_relative_eq!(angle_between(up, Vector2::new(-1.0, 0.0)), PI / 2.0);
        assert_relative_eq!(angle_between(up, Vector2::new(0.0, -3.0)), PI);
        assert_relative_eq!(angle_between(up, Vector2::new(0.0, 2.0)), 0.0);
    }

    #[test]
    fn test_closest_approach_stationary() {
        let x1 = Vector2::new(0.0, 0.0);
        let x2 = Vector2::new(5.0, 0.0);
        assert_eq!(time_of_closest_approach(x1, Vector2::ZERO, x2, Vector2::ZERO), 0.0);
        assert_relative_eq!(squared_min_distance(x1, Vector2::ZERO, x2, Vector2::ZERO), 25.0);
        assert_relative_eq!(min_distance(x1, Vector2::ZERO, x2, Vector2::ZERO), 5.0);
    }

    #[test]
    fn test_closest_approach_crossing() {
        // 原点に静止する点と、(−10, 3) から +x 方向に 2 で進む点
        let x1 = Vector2::new(-10.0, 3.0);
        let v1 = Vector2::new(2.0, 0.0);
        let t = time_of_closest_approach(x1, v1, Vector2::ZERO, Vector2::ZERO);
        assert_relative_eq!(t, 5.0);
        assert_relative_eq!(min_distance(x1, v1, Vector2::ZERO, Vector2::ZERO), 3.0);

        // 遠ざかっている場合は負の時刻
        let receding = time_of_closest_approach(-x1, v1, Vector2::ZERO, Vector2::ZERO);
        assert!(receding < 0.0);
    }
}
