use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use mp_core::{Error, ImageRef, OcrOutcome, ProcessedArticle};
use mp_scraper::assemble_content;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ArticleQuery {
    pub url: String,
    #[serde(default = "default_true")]
    pub include_ocr: bool,
    #[serde(default = "default_true")]
    pub download_images: bool,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub url: String,
    #[serde(default = "default_true")]
    pub include_ocr: bool,
    #[serde(default = "default_true")]
    pub download_images: bool,
}

#[derive(Debug, Serialize)]
pub struct OcrResultView {
    pub index: usize,
    pub image_url: String,
    pub local_path: String,
    pub outcome: OcrOutcome,
    /// Same text that ends up in the stored record
    pub ocr_text: String,
    pub alt: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ArticleInfo {
    pub url: String,
    pub title: String,
    pub content: String,
    pub account_name: String,
    pub publish_date: String,
    pub images: Vec<ImageRef>,
    pub ocr_results: Vec<OcrResultView>,
    pub image_count: usize,
    pub ocr_count: usize,
    pub content_length: usize,
}

impl From<ProcessedArticle> for ArticleInfo {
    fn from(article: ProcessedArticle) -> Self {
        let doc = article.document;
        let ocr_results: Vec<OcrResultView> = doc
            .ocr_results
            .into_iter()
            .map(|r| OcrResultView {
                ocr_text: r.outcome.render(),
                index: r.index,
                image_url: r.image_url,
                local_path: r.local_path,
                outcome: r.outcome,
                alt: r.alt,
                title: r.title,
            })
            .collect();
        Self {
            image_count: doc.images.len(),
            ocr_count: ocr_results.len(),
            content_length: doc.content.chars().count(),
            url: doc.url,
            title: doc.title,
            content: doc.content,
            account_name: doc.account_name,
            publish_date: doc.publish_date,
            images: doc.images,
            ocr_results,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SaveResult {
    pub title: String,
    pub account_name: String,
    pub publish_date: String,
    /// Characters of the stored content, OCR section included
    pub content_length: usize,
    pub image_count: usize,
    pub ocr_count: usize,
    pub feishu_record_id: String,
}

/// Pipeline errors rendered as `{success: false, message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_client_facing() {
            warn!("Article unavailable: {}", err);
            Self::bad_request(format!("Article content unavailable: {}", err))
        } else {
            error!("Request failed: {}", err);
            Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: err.to_string(),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "message": self.message })),
        )
            .into_response()
    }
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "mp article scraper",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at.to_rfc3339(),
        "feishu_enabled": state.feishu_enabled(),
        "endpoints": {
            "GET /health": "health check",
            "GET /article/info?url=": "scrape an article without saving it",
            "POST /article/save-to-feishu": "scrape an article and store it in Feishu Bitable",
        },
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": Utc::now().to_rfc3339() }))
}

pub async fn article_info(
    State(state): State<AppState>,
    Query(query): Query<ArticleQuery>,
) -> Result<Json<ApiResponse<ArticleInfo>>, ApiError> {
    info!("🌐 GET /article/info {}", query.url);
    let article = state
        .pipeline
        .process(&query.url, query.include_ocr, query.download_images)
        .await?;
    Ok(Json(ApiResponse::ok(
        "Article fetched",
        ArticleInfo::from(article),
    )))
}

pub async fn save_to_feishu(
    State(state): State<AppState>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<ApiResponse<SaveResult>>, ApiError> {
    if !state.feishu_enabled() {
        return Err(ApiError::bad_request("Feishu integration is not enabled"));
    }
    info!("🌐 POST /article/save-to-feishu {}", request.url);

    let (article, record_id) = state
        .pipeline
        .process_and_persist(&request.url, request.include_ocr, request.download_images)
        .await?;
    let doc = &article.document;
    let result = SaveResult {
        title: doc.title.clone(),
        account_name: doc.account_name.clone(),
        publish_date: doc.publish_date.clone(),
        content_length: assemble_content(&doc.content, &doc.ocr_results).chars().count(),
        image_count: doc.images.len(),
        ocr_count: doc.ocr_results.len(),
        feishu_record_id: record_id,
    };
    Ok(Json(ApiResponse::ok("Article saved to Feishu", result)))
}
