// 数据库实体定义

pub mod rate_record;
pub mod usage_log;

pub use rate_record::RateRecord;
pub use usage_log::UsageLogEntry;
