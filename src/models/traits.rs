use crate::models::common::Vector2;
use crate::render::IRenderSurface;
use crate::world::TickContext;

/// ワールドに登録され、毎ティック処理される全エンティティの基本インターフェース
pub trait IEntity {
    /// エンティティ名（ログ出力用）
    fn name(&self) -> &str;

    /// 1ティックの処理実行
    ///
    /// 他エンティティへの作用（撃墜、自爆指示、新規登録）は `ctx` にコマンドとして積みます。
    fn advance(&mut self, ctx: &mut TickContext<'_>);

    /// 現在の状態を描画
    fn draw(&mut self, surface: &mut dyn IRenderSurface);

    /// 前回の描画を消去
    fn erase(&mut self, surface: &mut dyn IRenderSurface);
}

/// 位置と速度を持つ物体のインターフェース
pub trait IPhysicalBody {
    /// 現在位置の取得
    fn position(&self) -> Vector2;

    /// 現在速度の取得
    fn velocity(&self) -> Vector2;
}
