use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// 2次元ベクトル（位置・速度の両方に使用）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 全成分が同じ値のベクトル
    pub const fn splat(value: f64) -> Self {
        Self { x: value, y: value }
    }

    /// 内積
    pub fn dot(&self, other: &Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// 2次元外積（z成分のみのスカラー）
    pub fn cross(&self, other: &Vector2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// ベクトルの長さ
    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// 成分ごとの絶対値
    pub fn abs(&self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    pub fn components(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [x, y] => Some(Self::new(*x, *y)),
            _ => None,
        }
    }
}

impl From<f64> for Vector2 {
    fn from(value: f64) -> Self {
        Self::splat(value)
    }
}

impl From<[f64; 2]> for Vector2 {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3}]", self.x, self.y)
    }
}

impl Add for Vector2 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vector2 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl Mul<Vector2> for f64 {
    type Output = Vector2;

    fn mul(self, vector: Vector2) -> Self::Output {
        vector * self
    }
}

impl Neg for Vector2 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// レジストリ内のエンティティを指す安定したハンドル
///
/// 登録順に単調増加で払い出され、削除されても再利用されません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 世界座標の境界（軸ごとの下限・上限）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub lower: Vector2,
    pub upper: Vector2,
}

impl WorldBounds {
    pub fn new(lower: Vector2, upper: Vector2) -> Self {
        Self { lower, upper }
    }

    /// いずれかの軸で境界外かどうか
    pub fn is_outside(&self, position: Vector2) -> bool {
        position.x < self.lower.x
            || position.y < self.lower.y
            || position.x > self.upper.x
            || position.y > self.upper.y
    }

    pub fn contains(&self, position: Vector2) -> bool {
        !self.is_outside(position)
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            lower: Vector2::new(0.0, 0.0),
            upper: Vector2::new(100.0, 100.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_ops() {
        let a = Vector2::new(1.0, 2.0);
        let b = Vector2::new(3.0, -1.0);
        assert_eq!(a + b, Vector2::new(4.0, 1.0));
        assert_eq!(a - b, Vector2::new(-2.0, 3.0));
        assert_eq!(a * 2.0, Vector2::new(2.0, 4.0));
        assert_eq!(2.0 * a, a * 2.0);
        assert_eq!(a.dot(&b), 1.0);
        assert_eq!(a.cross(&b), -7.0);
        assert_eq!(Vector2::new(3.0, 4.0).magnitude(), 5.0);
    }

    #[test]
    fn test_bounds() {
        let bounds = WorldBounds::default();
        assert!(bounds.contains(Vector2::new(0.0, 100.0)));
        assert!(bounds.is_outside(Vector2::new(-0.1, 50.0)));
        assert!(bounds.is_outside(Vector2::new(50.0, 100.1)));
    }
}
