// ==========================================
// 奢品物流运营控制台 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑,只负责数据访问与并发控制
// ==========================================

pub mod approval_repo;
pub mod error;
pub mod event_repo;
pub mod reservation_repo;
pub mod version_repo;

pub use approval_repo::ApprovalRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use event_repo::EventLogRepository;
pub use reservation_repo::{DayAggregate, ReservationRepository, RUSH_PRIORITY_MAX};
pub use version_repo::VersionRepository;
