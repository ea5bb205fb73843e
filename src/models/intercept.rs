//! # 迎撃解算モジュール
//!
//! 静止した発射機から一定速度の弾体を撃ち出し、等速直線運動する目標と
//! 将来の同一時刻に同一地点で会合させるための射撃諸元（会合時間と弾体速度）を
//! 閉形式で求めます。
//!
//! 移動する発射機には対応していません。呼び出し側は発射機を静止しているものとして扱います。

use crate::models::common::Vector2;
use tracing::debug;

/// 射撃解
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiringSolution {
    /// 発射から会合までの時間
    pub time: f64,
    /// 弾体速度ベクトル（大きさは弾体速度に一致）
    pub velocity: Vector2,
}

/// 射撃諸元を計算
///
/// # 引数
///
/// * `gun_position` - 発射機位置
/// * `projectile_speed` - 弾体速度の大きさ
/// * `target_position` - 目標の現在位置
/// * `target_velocity` - 目標の速度
///
/// # 戻り値
///
/// 正の会合時間を持つ解のうち最も早いもの。目標が発射機と同位置、
/// 実数解なし、または正の時刻の解がない場合は `None`。
pub fn solve_firing_solution(
    gun_position: Vector2,
    projectile_speed: f64,
    target_position: Vector2,
    target_velocity: Vector2,
) -> Option<FiringSolution> {
    let d = target_position - gun_position;
    let (d1, d2) = (d.x, d.y);
    let dsq = d1 * d1 + d2 * d2;
    if dsq == 0.0 {
        debug!("FIRING_SOLUTION_REJECTED: 目標が発射機と同位置です");
        return None;
    }

    let (vt1, vt2) = (target_velocity.x, target_velocity.y);
    let dis = projectile_speed.powi(2) * dsq - (d1 * vt2 - d2 * vt1).powi(2);
    if dis < 0.0 {
        debug!(discriminant = dis, "FIRING_SOLUTION_REJECTED: 射撃方程式に実数解がありません");
        return None;
    }

    let vtsq = vt1 * vt1 + vt2 * vt2;
    let denom = vtsq - projectile_speed.powi(2);
    if denom.abs() <= f64::EPSILON * projectile_speed.powi(2).max(vtsq) {
        // 目標と弾体の速さが等しいと会合方程式は1次式になる
        return solve_equal_speed(d, dsq, target_velocity);
    }

    let sqrt_dis = dis.sqrt();
    let a = d2 * d2 * vt1 - d1 * d2 * vt2;
    let b = d1 * (d1 * vt2 - d2 * vt1);
    let c = -d1 * vt1 - d2 * vt2;

    let candidates = [
        FiringSolution {
            time: (c + sqrt_dis) / denom,
            velocity: Vector2::new((a - d1 * sqrt_dis) / dsq, (b - d2 * sqrt_dis) / dsq),
        },
        FiringSolution {
            time: (c - sqrt_dis) / denom,
            velocity: Vector2::new((a + d1 * sqrt_dis) / dsq, (b + d2 * sqrt_dis) / dsq),
        },
    ];
    debug!(?candidates, "射撃解候補");

    candidates
        .into_iter()
        .filter(|solution| solution.time.is_finite() && solution.time > 0.0)
        .min_by(|lhs, rhs| lhs.time.total_cmp(&rhs.time))
}

/// 目標速度の大きさが弾体速度と等しい場合の射撃解
///
/// `|d + vt·t|² = |vt|²·t²` から `t = −|d|² / (2·d·vt)`。目標が近づいてこない
/// （`d·vt >= 0`）場合は会合しません。
fn solve_equal_speed(d: Vector2, dsq: f64, target_velocity: Vector2) -> Option<FiringSolution> {
    let closing = d.dot(&target_velocity);
    if closing >= 0.0 {
        debug!(closing, "FIRING_SOLUTION_REJECTED: 同速の目標が接近していません");
        return None;
    }
    let time = -dsq / (2.0 * closing);
    let solution = FiringSolution {
        time,
        velocity: d * (1.0 / time) + target_velocity,
    };
    debug!(?solution, "同速目標の射撃解");
    Some(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_meets(gun: Vector2, target: Vector2, target_velocity: Vector2, solution: FiringSolution) {
        let projectile = gun + solution.velocity * solution.time;
        let predicted = target + target_velocity * solution.time;
        assert_relative_eq!(projectile.x, predicted.x, epsilon = 1e-9);
        assert_relative_eq!(projectile.y, predicted.y, epsilon = 1e-9);
    }

    #[test]
    fn test_stationary_target() {
        let solution =
            solve_firing_solution(Vector2::ZERO, 10.0, Vector2::new(10.0, 0.0), Vector2::ZERO)
                .expect("solution");
        assert_relative_eq!(solution.time, 1.0);
        assert_relative_eq!(solution.velocity.x, 10.0);
        assert_relative_eq!(solution.velocity.y, 0.0);
    }

    #[test]
    fn test_moving_target_meets_projectile() {
        let gun = Vector2::new(75.0, 0.0);
        let target = Vector2::new(25.0, 90.0);
        let target_velocity = Vector2::new(12.0, -9.0);
        let solution = solve_firing_solution(gun, 50.0, target, target_velocity).expect("solution");
        assert!(solution.time > 0.0);
        assert_relative_eq!(solution.velocity.magnitude(), 50.0, epsilon = 1e-9);
        assert_meets(gun, target, target_velocity, solution);
    }

    #[test]
    fn test_target_at_gun_position() {
        let gun = Vector2::new(3.0, 4.0);
        assert_eq!(solve_firing_solution(gun, 10.0, gun, Vector2::new(1.0, 0.0)), None);
    }

    #[test]
    fn test_target_outrunning_projectile() {
        // 目標が弾体より速く横方向に逃げる場合は実数解がない
        let solution = solve_firing_solution(
            Vector2::ZERO,
            1.0,
            Vector2::new(10.0, 0.0),
            Vector2::new(0.0, 5.0),
        );
        assert_eq!(solution, None);
    }

    #[test]
    fn test_equal_speed_target_has_finite_intercept() {
        let gun = Vector2::ZERO;
        let target = Vector2::new(10.0, 0.0);
        let target_velocity = Vector2::new(-6.0, 8.0);
        let solution = solve_firing_solution(gun, 10.0, target, target_velocity).expect("solution");
        assert!(solution.time.is_finite());
        assert_relative_eq!(solution.time, 100.0 / 120.0, epsilon = 1e-12);
        assert_relative_eq!(solution.velocity.x, 6.0, epsilon = 1e-9);
        assert_relative_eq!(solution.velocity.y, 8.0, epsilon = 1e-9);
        assert_relative_eq!(solution.velocity.magnitude(), 10.0, epsilon = 1e-9);
        assert_meets(gun, target, target_velocity, solution);
    }

    #[test]
    fn test_equal_speed_receding_target() {
        let solution = solve_firing_solution(
            Vector2::ZERO,
            10.0,
            Vector2::new(10.0, 0.0),
            Vector2::new(6.0, 8.0),
        );
        assert_eq!(solution, None);
    }

    #[test]
    fn test_receding_faster_target_has_no_positive_time() {
        // 真っ直ぐ遠ざかる、弾体より速い目標
        let solution = solve_firing_solution(
            Vector2::ZERO,
            5.0,
            Vector2::new(10.0, 0.0),
            Vector2::new(8.0, 0.0),
        );
        assert_eq!(solution, None);
    }
}
