// ==========================================
// 日志系统初始化
// ==========================================
// tracing + tracing-subscriber, 级别由 RUST_LOG 控制
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统 (进程内只调用一次)
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器, 默认 info
///   例如: RUST_LOG=debug 或 RUST_LOG=luxe_ops=trace
///
/// # 示例
/// ```no_run
/// use luxe_ops::logging;
/// logging::init();
/// ```
pub fn init() {
    fmt()
        .with_env_filter(default_filter())
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// 测试环境日志: debug 级别, 输出接入测试捕获; 重复调用安全
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
