use std::env;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEBUG_ENV: &str = "TOOLFLOW_DEBUG";
const DEFAULT_FILTER: &str = "toolflow=info,warn";
const DEBUG_FILTER: &str = "toolflow=debug,info";

/// 日志配置
///
/// 日志一律写到 stderr，stdout 留给 CLI 输出的事件流帧。
///
/// 支持通过环境变量配置：
/// - RUST_LOG: 覆盖过滤规则
/// - TOOLFLOW_DEBUG: 打开调试级别并附带文件、行号与线程 id
///
/// ```no_run
/// use toolflow::utils::LoggingConfig;
///
/// LoggingConfig::from_env().verbose(true).install();
/// ```
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    filter: Option<String>,
    verbose: bool,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            filter: None,
            verbose: Self::is_debug(),
        }
    }

    /// 固定过滤规则，忽略 RUST_LOG
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = self.verbose || verbose;
        self
    }

    /// 按环境变量初始化
    pub fn init() {
        Self::from_env().install();
    }

    /// 安装全局订阅者；已经安装过时保持原有订阅者
    pub fn install(&self) {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.verbose)
            .with_file(self.verbose)
            .with_line_number(self.verbose)
            .with_thread_ids(self.verbose);

        let installed = tracing_subscriber::registry()
            .with(self.env_filter())
            .with(fmt_layer)
            .try_init()
            .is_ok();

        if installed && self.verbose {
            tracing::debug!("调试模式已启用");
        }
    }

    fn env_filter(&self) -> EnvFilter {
        if let Some(filter) = &self.filter {
            return EnvFilter::new(filter);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if self.verbose {
                DEBUG_FILTER
            } else {
                DEFAULT_FILTER
            })
        })
    }

    /// 检查是否启用调试模式
    pub fn is_debug() -> bool {
        env::var(DEBUG_ENV).is_ok()
    }
}
