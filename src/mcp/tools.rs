//! Tool definitions and handlers exposed over MCP.
//!
//! Each tool takes a flat argument object mirroring the CLI options and
//! answers with one pretty-printed JSON text item.

use crate::config::ConversionRequest;
use crate::convert::Converter;
use crate::engine::EngineBackend;
use crate::error::Pdf2ImgError;
use crate::mcp::protocol::{Tool, ToolResultContent};
use crate::optimize::{optimize_pdf, OptimizeConfig};
use crate::output::ConversionResult;
use crate::pool::PoolConfig;
use crate::split::{split_pdf, SplitRequest};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;

pub const PDF_TO_IMAGES: &str = "pdf_to_images";
pub const PDF_INFO: &str = "pdf_info";
pub const PDF_SPLIT: &str = "pdf_split";
pub const PDF_COMPRESS: &str = "pdf_compress";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments did not match the tool's input schema.
    #[error("Invalid arguments for {tool}: {detail}")]
    InvalidArguments { tool: String, detail: String },

    #[error(transparent)]
    Failed(#[from] Pdf2ImgError),
}

#[derive(Debug, Deserialize)]
struct ToImagesArgs {
    pdf_path: PathBuf,
    output_dir: PathBuf,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    dpi: Option<f32>,
    #[serde(default)]
    start_page: Option<usize>,
    #[serde(default)]
    end_page: Option<usize>,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    retry: Option<bool>,
    #[serde(default)]
    refresh_every: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct InfoArgs {
    pdf_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SplitArgs {
    pdf_path: PathBuf,
    output_path: PathBuf,
    #[serde(default)]
    start_page: Option<usize>,
    #[serde(default)]
    end_page: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CompressArgs {
    pdf_path: PathBuf,
    output_path: PathBuf,
}

/// Every tool this server offers, in `tools/list` order.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: PDF_TO_IMAGES.to_string(),
            description: Some(
                "Convert PDF pages to PNG or JPEG images, one file per page".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pdf_path": {
                        "type": "string",
                        "description": "Path to the input PDF file"
                    },
                    "output_dir": {
                        "type": "string",
                        "description": "Directory to write the page images to"
                    },
                    "format": {
                        "type": "string",
                        "enum": ["png", "jpg", "jpeg"],
                        "description": "Image format (default: png)"
                    },
                    "dpi": {
                        "type": "number",
                        "description": "Rendering resolution in DPI (default: 150)"
                    },
                    "start_page": {
                        "type": "integer",
                        "description": "First page to convert, 1-indexed (default: first page)"
                    },
                    "end_page": {
                        "type": "integer",
                        "description": "Last page to convert, inclusive (default: last page)"
                    },
                    "prefix": {
                        "type": "string",
                        "description": "Output filename prefix (default: page_)"
                    },
                    "retry": {
                        "type": "boolean",
                        "description": "Retry pages that hit an engine fault once at reduced DPI"
                    },
                    "refresh_every": {
                        "type": "integer",
                        "description": "Replace the engine instance after this many pages (0 disables)"
                    }
                },
                "required": ["pdf_path", "output_dir"]
            }),
        },
        Tool {
            name: PDF_INFO.to_string(),
            description: Some("Page count, file size and page dimensions of a PDF".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pdf_path": {
                        "type": "string",
                        "description": "Path to the PDF file"
                    }
                },
                "required": ["pdf_path"]
            }),
        },
        Tool {
            name: PDF_SPLIT.to_string(),
            description: Some("Extract a page range of a PDF into a new PDF".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pdf_path": {
                        "type": "string",
                        "description": "Path to the input PDF file"
                    },
                    "output_path": {
                        "type": "string",
                        "description": "Path of the PDF to create"
                    },
                    "start_page": {
                        "type": "integer",
                        "description": "First page to extract, 1-indexed"
                    },
                    "end_page": {
                        "type": "integer",
                        "description": "Last page to extract, inclusive"
                    }
                },
                "required": ["pdf_path", "output_path"]
            }),
        },
        Tool {
            name: PDF_COMPRESS.to_string(),
            description: Some("Rewrite a PDF more compactly without re-encoding content".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pdf_path": {
                        "type": "string",
                        "description": "Path to the input PDF file"
                    },
                    "output_path": {
                        "type": "string",
                        "description": "Path of the rewritten PDF"
                    }
                },
                "required": ["pdf_path", "output_path"]
            }),
        },
    ]
}

/// Run the named tool with `arguments`.
pub async fn handle_tool_call<B: EngineBackend>(
    converter: &Converter<B>,
    name: &str,
    arguments: Value,
) -> Result<Vec<ToolResultContent>, ToolError> {
    let summary = match name {
        PDF_TO_IMAGES => {
            let args: ToImagesArgs = parse_args(name, arguments)?;
            let result = converter
                .convert_async(conversion_request(args, converter.pool().config())?)
                .await?;
            conversion_summary(&result)
        }
        PDF_INFO => {
            let args: InfoArgs = parse_args(name, arguments)?;
            let info = converter.inspect_async(args.pdf_path).await?;
            serde_json::to_value(&info).map_err(internal)?
        }
        PDF_SPLIT => {
            let args: SplitArgs = parse_args(name, arguments)?;
            let request = SplitRequest {
                input: args.pdf_path,
                output: args.output_path,
                start_page: args.start_page.unwrap_or(0),
                end_page: args.end_page.unwrap_or(0),
            };
            let result = blocking(move || split_pdf(&request)).await?;
            json!({
                "total_pages": result.total_pages,
                "extracted_pages": result.extracted_pages,
                "output_path": result.output_path,
            })
        }
        PDF_COMPRESS => {
            let args: CompressArgs = parse_args(name, arguments)?;
            let output = args.output_path.clone();
            let result = blocking(move || {
                optimize_pdf(&args.pdf_path, &args.output_path, &OptimizeConfig::default())
            })
            .await?;
            json!({
                "output_path": output,
                "original_size": result.original_size,
                "optimized_size": result.optimized_size,
                "saved_percent": (result.saved_percent() * 10.0).round() / 10.0,
            })
        }
        other => return Err(ToolError::UnknownTool(other.to_string())),
    };

    let text = serde_json::to_string_pretty(&summary).map_err(internal)?;
    Ok(vec![ToolResultContent::text(text)])
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    // A missing `arguments` member reaches us as null.
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        detail: e.to_string(),
    })
}

/// Build a request from the call arguments, defaulting the pool settings to
/// the ones the server was started with.
fn conversion_request(
    args: ToImagesArgs,
    pool: &PoolConfig,
) -> Result<ConversionRequest, Pdf2ImgError> {
    let mut builder = ConversionRequest::builder(args.pdf_path, args.output_dir)
        .pool_size(pool.max_instances)
        .acquire_timeout(pool.acquire_timeout)
        .refresh_every(pool.refresh_every)
        .pages(args.start_page.unwrap_or(0), args.end_page.unwrap_or(0))
        .retry_failed(args.retry.unwrap_or(false));
    if let Some(format) = args.format {
        builder = builder.format(format);
    }
    if let Some(dpi) = args.dpi {
        builder = builder.dpi(dpi);
    }
    if let Some(prefix) = args.prefix {
        builder = builder.prefix(prefix);
    }
    if let Some(pages) = args.refresh_every {
        builder = builder.refresh_every(pages);
    }
    builder.build()
}

fn conversion_summary(result: &ConversionResult) -> Value {
    let mut summary = json!({
        "total_pages": result.total_pages,
        "successful": result.successful,
        "failed": result.failed,
        "files": result.output_files,
    });
    if !result.errors.is_empty() {
        summary["errors"] = json!(result.error_messages());
    }
    if !result.warning_pages.is_empty() {
        summary["warning_pages"] = json!(result.warning_pages);
    }
    if !result.retried_pages.is_empty() {
        summary["retried_pages"] = json!(result.retried_pages);
    }
    if result.cancelled {
        summary["cancelled"] = json!(true);
    }
    summary
}

async fn blocking<T, F>(f: F) -> Result<T, Pdf2ImgError>
where
    F: FnOnce() -> Result<T, Pdf2ImgError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Tool task panicked: {}", e)))?
}

fn internal(e: serde_json::Error) -> ToolError {
    ToolError::Failed(Pdf2ImgError::Internal(format!(
        "Failed to serialise tool result: {}",
        e
    )))
}
