//! 命令行入口
//!
//! - `page`: 翻译保存下来的 HTML 页面
//! - `text`: 翻译一段文本，输出 JSON 格式的消息回复
//! - `languages`: 列出支持的语言

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use tracing_subscriber::EnvFilter;

use native_translate::env::{core::LogLevel, storage::StorePath, EnvVar};
use native_translate::feedback::TracingFeedback;
use native_translate::parsers::html::{get_charset, html_to_dom, serialize_document};
use native_translate::translation::capability::deeplx::DeeplxHost;
use native_translate::translation::config::config_file_exists;
use native_translate::translation::languages::SUPPORTED_LANGUAGES;
use native_translate::translation::storage::{
    ExtensionStorage, JsonFileStore, KeyValueStore, MemoryStore,
};
use native_translate::translation::{
    ConfigManager, MessageResponse, SessionContext, TranslationConfig, TranslationError,
    TranslationResult, TranslationService,
};

#[derive(Parser, Debug)]
#[command(name = "native-translate", version)]
#[command(about = "Translate HTML pages and text in place through a DeepLX-compatible backend")]
struct Cli {
    /// 配置文件路径，缺省时按默认路径查找
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖 NATIVE_TRANSLATE_LOG_LEVEL
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 翻译保存下来的 HTML 页面
    Page {
        input: PathBuf,

        /// 输出文件，缺省时写到标准输出
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 目标语言
        #[arg(short, long)]
        target: Option<String>,

        #[arg(long)]
        api_url: Option<String>,
    },
    /// 翻译一段文本
    Text {
        text: String,

        /// 源语言，auto 表示自动检测
        #[arg(short, long, default_value = "auto")]
        source: String,

        /// 目标语言
        #[arg(short, long)]
        target: Option<String>,

        #[arg(long)]
        api_url: Option<String>,

        /// 译文片段到达时立即写到标准错误
        #[arg(long)]
        stream: bool,
    },
    /// 列出支持的语言
    Languages,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(level: Option<&str>) {
    let level = match level {
        Some(level) => LogLevel::parse(level).unwrap_or_else(|e| {
            eprintln!("Warning: {}", e);
            "info".to_string()
        }),
        None => LogLevel::get_or_default("info".to_string()),
    };

    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> TranslationResult<()> {
    if let Command::Languages = cli.command {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for language in SUPPORTED_LANGUAGES {
            writeln!(out, "{}\t{}", language.code, language.label)?;
        }
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    // DOM 句柄不能跨线程，整个翻译流程跑在单线程运行时上
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Command::Page {
            input,
            output,
            target,
            api_url,
        } => runtime.block_on(translate_page_file(
            config,
            &input,
            output.as_deref(),
            target,
            api_url,
        )),
        Command::Text {
            text,
            source,
            target,
            api_url,
            stream,
        } => runtime.block_on(translate_text(config, text, source, target, api_url, stream)),
        Command::Languages => Ok(()),
    }
}

fn load_config(path: Option<&Path>) -> TranslationResult<TranslationConfig> {
    let manager = match path {
        Some(path) => ConfigManager::from_path(path)?,
        None => {
            if !config_file_exists() {
                tracing::debug!("未找到配置文件，使用默认配置和环境变量");
            }
            ConfigManager::new()?
        }
    };
    Ok(manager.into_config())
}

/// 本地存储文件：配置 → 环境变量 → 系统数据目录
fn store_path(config: &TranslationConfig) -> Option<PathBuf> {
    if let Some(path) = &config.store_path {
        return Some(PathBuf::from(shellexpand::tilde(path).to_string()));
    }
    if let Some(Ok(path)) = StorePath::lookup() {
        return Some(PathBuf::from(path));
    }
    ProjectDirs::from("dev", "zhanghe", "native-translate")
        .map(|dirs| dirs.data_dir().join("storage.json"))
}

fn open_storage(config: &TranslationConfig) -> TranslationResult<ExtensionStorage> {
    let local = match store_path(config) {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            tracing::debug!(path = %path.display(), "使用本地存储文件");
            Arc::new(JsonFileStore::open(&path)?) as Arc<dyn KeyValueStore>
        }
        None => {
            tracing::warn!("无法确定本地存储位置，就绪记录不会保留");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(ExtensionStorage::new(Some(Arc::new(MemoryStore::new())), local))
}

fn build_service(
    mut config: TranslationConfig,
    api_url: Option<String>,
) -> TranslationResult<TranslationService> {
    if let Some(api_url) = api_url {
        config.api_url = api_url;
        config.validate()?;
    }

    let host = DeeplxHost::new(&config.api_url, config.request_timeout())?;
    let storage = open_storage(&config)?;
    let session = SessionContext::new(Arc::new(host), Arc::new(storage), config);
    Ok(TranslationService::new(session))
}

async fn translate_page_file(
    config: TranslationConfig,
    input: &Path,
    output: Option<&Path>,
    target: Option<String>,
    api_url: Option<String>,
) -> TranslationResult<()> {
    let target = target.unwrap_or_else(|| config.target_language.clone());
    let data = fs::read(input)?;

    let mut dom = html_to_dom(&data, "utf-8")?;
    let mut encoding = "utf-8".to_string();
    if let Some(charset) = get_charset(&dom.document) {
        if !charset.eq_ignore_ascii_case("utf-8") {
            dom = html_to_dom(&data, &charset)?;
            encoding = charset;
        }
    }

    let service = build_service(config, api_url)?;
    let page = service
        .translate_page(&dom.document, &target, &TracingFeedback)
        .await?;

    tracing::info!(
        source = %page.source,
        target = %page.target,
        translated = page.report.translated,
        total = page.report.total,
        cache_hits = page.report.cache_hits,
        "页面翻译结束"
    );

    let bytes = serialize_document(&dom, &encoding)?;
    match output {
        Some(path) => fs::write(path, bytes)?,
        None => io::stdout().write_all(&bytes)?,
    }
    Ok(())
}

async fn translate_text(
    config: TranslationConfig,
    text: String,
    source: String,
    target: Option<String>,
    api_url: Option<String>,
    stream: bool,
) -> TranslationResult<()> {
    let target = target.unwrap_or_else(|| config.target_language.clone());

    let response = match build_service(config, api_url) {
        Ok(service) if stream => {
            let mut stderr = io::stderr();
            let mut sink = |chunk: &str| {
                let _ = stderr.write_all(chunk.as_bytes());
                let _ = stderr.flush();
            };
            let outcome = service
                .translate_text_live(&text, Some(&source), &target, &mut sink)
                .await;
            let _ = writeln!(io::stderr());
            match outcome {
                Ok(Some(translation)) => {
                    MessageResponse::success(translation.text, Some(translation.detected_source))
                }
                Ok(None) => MessageResponse::failure(&TranslationError::InternalError(
                    "翻译被取消".to_string(),
                )),
                Err(e) => MessageResponse::failure(&e),
            }
        }
        Ok(service) => match service
            .translate_text(None, &text, Some(&source), &target, None)
            .await
        {
            Ok(translation) => {
                MessageResponse::success(translation.text, Some(translation.detected_source))
            }
            Err(e) => MessageResponse::failure(&e),
        },
        Err(e) => MessageResponse::failure(&e),
    };

    let json = serde_json::to_string(&response)?;
    println!("{}", json);

    if response.ok {
        Ok(())
    } else {
        Err(TranslationError::TranslationServiceError(
            response.error.unwrap_or_default(),
        ))
    }
}
