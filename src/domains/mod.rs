// 领域模块 - 用于组织应用的业务逻辑
//
// 将 AppState 按业务领域分组，实现单一职责原则
// 包含4个领域:系统、地理、通知、市场

pub mod geo;
pub mod market;
pub mod notify;
pub mod system;

pub use geo::GeoDomain;
pub use market::MarketDomain;
pub use notify::NotifyDomain;
pub use system::SystemDomain;
