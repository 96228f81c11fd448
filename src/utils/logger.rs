use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "fragment_harness=info";
const VERBOSE_FILTER: &str = "fragment_harness=debug,info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 終端機用的精簡格式
    Compact,
    /// 一行一個 JSON 物件，給 CI 收集
    Json,
}

/// `RUST_LOG` 有設定時優先使用
pub fn filter_for(verbose: bool) -> EnvFilter {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

pub fn init_logger(verbose: bool, format: LogFormat) {
    let layer = match format {
        LogFormat::Compact => fmt::layer()
            .with_target(verbose)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter_for(verbose))
        .with(layer)
        .init();
}

pub fn init_cli_logger(verbose: bool) {
    init_logger(verbose, LogFormat::Compact);
}

pub fn init_json_logger(verbose: bool) {
    init_logger(verbose, LogFormat::Json);
}
