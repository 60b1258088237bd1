//! Web API
//!
//! # 设计思路
//!
//! `axum` 路由挂在共享的 `ClipboardManager` 门面上，与 CLI 行为一致。
//! 数据库初始化失败时服务进入降级模式：进程照常监听，所有数据接口
//! 统一返回 503，`/api/status` 仍可用，便于探活与诊断。
//!
//! # 响应约定
//!
//! - 列表接口返回分页信封 `{ items, page, per_page, total }`
//! - 文本条目带 100 字符 `preview`，图片条目带 base64 data URL
//! - 缺失 id 返回 404，存储错误返回 500，降级模式返回 503

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::Engine;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::clipboard::adapter::image_mime_type;
use crate::db::{ClipEntry, EntryFilter, EntryKind};
use crate::error::AppError;
use crate::manager::{ClipboardManager, CopyOutcome, preview_of};

const PREVIEW_CHARS: usize = 100;
const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// 路由共享状态；`manager` 为 `None` 时服务处于降级模式
#[derive(Clone)]
pub struct ApiState {
    manager: Option<Arc<ClipboardManager>>,
}

impl ApiState {
    pub fn new(manager: Option<Arc<ClipboardManager>>) -> Self {
        Self { manager }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/items", get(list_items))
        .route("/api/items/add", post(add_item))
        .route("/api/items/clear", post(clear_items))
        .route("/api/item/{id}", get(get_item).delete(delete_item))
        .route("/api/item/{id}/favorite", post(favorite_item))
        .route("/api/item/{id}/copy", post(copy_item))
        .route("/api/item/{id}/tags", get(item_tags).post(add_item_tag))
        .route("/api/item/{id}/tags/{tag}", delete(remove_item_tag))
        .route("/api/tags", get(list_tags))
        .with_state(state)
}

/// 启动 HTTP 服务并阻塞运行
pub fn serve(manager: Option<Arc<ClipboardManager>>, port: u16) -> Result<(), AppError> {
    let runtime = tokio::runtime::Runtime::new().map_err(AppError::Io)?;
    runtime.block_on(async move {
        let degraded = manager.is_none();
        let app = router(ApiState::new(manager));
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(AppError::Io)?;
        if degraded {
            log::warn!("🚫 存储不可用，服务以降级模式监听 http://{}", addr);
        } else {
            log::info!("📋 Web 服务监听 http://{}", addr);
        }
        axum::serve(listener, app).await.map_err(AppError::Io)
    })
}

// ============================================================================
// 响应构造
// ============================================================================

fn degraded() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "存储不可用，服务处于降级模式" })),
    )
        .into_response()
}

fn not_found(id: i64) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("记录 {} 不存在", id) })),
    )
        .into_response()
}

fn internal_error(err: AppError) -> Response {
    log::error!("接口内部错误: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err })),
    )
        .into_response()
}

/// 条目的 JSON 表示：文本带预览与全文，图片带 base64 data URL
fn entry_json(entry: &ClipEntry) -> Value {
    let mut value = json!({
        "id": entry.id,
        "kind": entry.kind,
        "timestamp": entry.timestamp,
        "favorite": entry.favorite,
        "tags": entry.tags,
    });
    match entry.kind {
        EntryKind::Text => {
            let text = entry.text().unwrap_or_default();
            value["preview"] = json!(preview_of(&text, PREVIEW_CHARS));
            value["content"] = json!(text);
        }
        EntryKind::Image => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&entry.content);
            value["image_data"] = json!(format!(
                "data:{};base64,{}",
                image_mime_type(&entry.content),
                encoded
            ));
        }
    }
    value
}

/// `filter` 查询参数映射到条目过滤条件；未知取值按 `all` 处理
fn filter_from_params(filter: Option<&str>, search: Option<String>) -> EntryFilter {
    let mut result = EntryFilter {
        search,
        ..Default::default()
    };
    match filter {
        Some("text") => result.kind = Some(EntryKind::Text),
        Some("image") => result.kind = Some(EntryKind::Image),
        Some("favorite") | Some("favorites") => result.favorites_only = true,
        _ => {}
    }
    result
}

/// 页码与每页条数的归一化：页码至少为 1，每页 1..=100
fn clamp_paging(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let per_page = per_page
        .filter(|n| *n >= 1)
        .unwrap_or(DEFAULT_PER_PAGE)
        .min(MAX_PER_PAGE);
    (page, per_page)
}

// ============================================================================
// 处理器
// ============================================================================

async fn status(State(state): State<ApiState>) -> Response {
    match state.manager.as_ref() {
        Some(manager) => Json(json!({
            "storage": "ok",
            "monitoring": manager.is_monitoring(),
            "track_images": manager.track_images(),
        }))
        .into_response(),
        None => Json(json!({ "storage": "unavailable" })).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<i64>,
    per_page: Option<i64>,
    filter: Option<String>,
    search: Option<String>,
}

async fn list_items(State(state): State<ApiState>, Query(query): Query<ListQuery>) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };

    let filter = filter_from_params(query.filter.as_deref(), query.search);

    match manager.list(&filter) {
        Ok(entries) => {
            let (page, per_page) = clamp_paging(query.page, query.per_page);
            let total = entries.len() as i64;
            let total_pages = if total == 0 { 0 } else { (total + per_page - 1) / per_page };
            // 页码来自客户端，偏移量计算必须对任意 i64 输入安全
            let start = usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
            let items: Vec<Value> = entries
                .iter()
                .skip(start)
                .take(per_page as usize)
                .map(entry_json)
                .collect();
            Json(json!({
                "items": items,
                "page": page,
                "per_page": per_page,
                "total": total,
                "total_pages": total_pages,
            }))
            .into_response()
        }
        Err(err) => internal_error(err),
    }
}

async fn get_item(State(state): State<ApiState>, Path(id): Path<i64>) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    match manager.get_entry(id) {
        Ok(Some(entry)) => Json(entry_json(&entry)).into_response(),
        Ok(None) => not_found(id),
        Err(err) => internal_error(err),
    }
}

async fn delete_item(State(state): State<ApiState>, Path(id): Path<i64>) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    match manager.delete_entry(id) {
        Ok(true) => Json(json!({ "deleted": id })).into_response(),
        Ok(false) => not_found(id),
        Err(err) => internal_error(err),
    }
}

async fn favorite_item(State(state): State<ApiState>, Path(id): Path<i64>) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    match manager.toggle_favorite(id) {
        Ok(Some(favorite)) => Json(json!({ "id": id, "favorite": favorite })).into_response(),
        Ok(None) => not_found(id),
        Err(err) => internal_error(err),
    }
}

async fn copy_item(State(state): State<ApiState>, Path(id): Path<i64>) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    match manager.copy_entry(id) {
        Ok(CopyOutcome::NotFound) => not_found(id),
        Ok(CopyOutcome::Text { clipboard_set, preview }) => Json(json!({
            "id": id,
            "copied": clipboard_set,
            "preview": preview,
        }))
        .into_response(),
        Ok(CopyOutcome::Image { clipboard_set }) => {
            Json(json!({ "id": id, "copied": clipboard_set })).into_response()
        }
        Err(err) => internal_error(err),
    }
}

#[derive(Debug, Deserialize)]
struct AddBody {
    text: String,
}

async fn add_item(State(state): State<ApiState>, Json(body): Json<AddBody>) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    match manager.add_text(&body.text) {
        Ok(Some(id)) => (StatusCode::CREATED, Json(json!({ "id": id }))).into_response(),
        Ok(None) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "空白文本不会被记录" })),
        )
            .into_response(),
        Err(err) => internal_error(err),
    }
}

#[derive(Debug, Deserialize)]
struct ClearBody {
    keep_favorites: Option<bool>,
}

async fn clear_items(
    State(state): State<ApiState>,
    body: Result<Json<ClearBody>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    // 请求体可省略，缺省保留收藏
    let keep_favorites = body
        .ok()
        .and_then(|Json(b)| b.keep_favorites)
        .unwrap_or(true);
    match manager.clear_history(keep_favorites) {
        Ok(count) => Json(json!({ "deleted": count })).into_response(),
        Err(err) => internal_error(err),
    }
}

#[derive(Debug, Deserialize)]
struct TagBody {
    tag: String,
}

async fn item_tags(State(state): State<ApiState>, Path(id): Path<i64>) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    match manager.entry_tags(id) {
        Ok(Some(tags)) => Json(json!({ "id": id, "tags": tags })).into_response(),
        Ok(None) => not_found(id),
        Err(err) => internal_error(err),
    }
}

async fn add_item_tag(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<TagBody>,
) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    let tag = body.tag.trim();
    if tag.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "标签不能为空" })),
        )
            .into_response();
    }
    match manager.add_tag(id, tag) {
        Ok(Some(tags)) => Json(json!({ "id": id, "tags": tags })).into_response(),
        Ok(None) => not_found(id),
        Err(err) => internal_error(err),
    }
}

async fn remove_item_tag(
    State(state): State<ApiState>,
    Path((id, tag)): Path<(i64, String)>,
) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    match manager.remove_tag(id, &tag) {
        Ok(Some(tags)) => Json(json!({ "id": id, "tags": tags })).into_response(),
        Ok(None) => not_found(id),
        Err(err) => internal_error(err),
    }
}

async fn list_tags(State(state): State<ApiState>) -> Response {
    let Some(manager) = state.manager.as_ref() else {
        return degraded();
    };
    match manager.all_tags() {
        Ok(tags) => Json(json!({ "tags": tags })).into_response(),
        Err(err) => internal_error(err),
    }
}

#[cfg(test)]
mod tests {
    use crate::clipboard::ClipboardPort;
    use crate::db::init_memory_db;

    use super::*;

    /// 接口测试用的空剪贴板后端
    struct NullClipboard;

    impl ClipboardPort for NullClipboard {
        fn get_text(&self) -> Option<String> {
            None
        }

        fn set_text(&self, _text: &str) -> bool {
            true
        }

        fn get_image(&self) -> Option<Vec<u8>> {
            None
        }

        fn set_image(&self, _data: &[u8]) -> bool {
            true
        }
    }

    fn live_state() -> ApiState {
        let db = Arc::new(init_memory_db().expect("init db"));
        let manager = Arc::new(ClipboardManager::new(db, Arc::new(NullClipboard), true));
        ApiState::new(Some(manager))
    }

    fn empty_query() -> ListQuery {
        ListQuery { page: None, per_page: None, filter: None, search: None }
    }

    #[tokio::test]
    async fn degraded_mode_returns_503_on_data_endpoints() {
        let state = ApiState::new(None);

        let list = list_items(State(state.clone()), Query(empty_query())).await;
        assert_eq!(list.status(), StatusCode::SERVICE_UNAVAILABLE);

        let item = get_item(State(state.clone()), Path(1)).await;
        assert_eq!(item.status(), StatusCode::SERVICE_UNAVAILABLE);

        let health = status(State(state)).await;
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_id_returns_404() {
        let state = live_state();

        let item = get_item(State(state.clone()), Path(42)).await;
        assert_eq!(item.status(), StatusCode::NOT_FOUND);

        let favorite = favorite_item(State(state.clone()), Path(42)).await;
        assert_eq!(favorite.status(), StatusCode::NOT_FOUND);

        let deleted = delete_item(State(state), Path(42)).await;
        assert_eq!(deleted.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn add_item_validates_blank_text() {
        let state = live_state();

        let blank = add_item(
            State(state.clone()),
            Json(AddBody { text: "   ".to_string() }),
        )
        .await;
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let created = add_item(
            State(state.clone()),
            Json(AddBody { text: "hello".to_string() }),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let blank_tag = add_item_tag(
            State(state),
            Path(1),
            Json(TagBody { tag: "  ".to_string() }),
        )
        .await;
        assert_eq!(blank_tag.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn extreme_page_number_yields_empty_page_not_panic() {
        let state = live_state();
        let manager = state.manager.as_ref().expect("live manager");
        manager.add_text("entry").expect("add").expect("accepted");

        let query = ListQuery {
            page: Some(i64::MAX),
            per_page: Some(100),
            filter: None,
            search: None,
        };
        let response = list_items(State(state), Query(query)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn paging_is_clamped_to_sane_bounds() {
        assert_eq!(clamp_paging(None, None), (1, DEFAULT_PER_PAGE));
        assert_eq!(clamp_paging(Some(0), Some(0)), (1, DEFAULT_PER_PAGE));
        assert_eq!(clamp_paging(Some(-3), Some(1000)), (1, MAX_PER_PAGE));
        assert_eq!(clamp_paging(Some(4), Some(50)), (4, 50));
    }

    #[test]
    fn text_entry_json_carries_preview_and_full_text() {
        let long = "x".repeat(150);
        let entry = ClipEntry {
            id: 1,
            content: long.clone().into_bytes(),
            kind: EntryKind::Text,
            timestamp: 123,
            favorite: false,
            tags: vec!["a".to_string()],
        };
        let value = entry_json(&entry);
        assert_eq!(value["kind"], "text");
        assert_eq!(value["content"], long.as_str());
        assert_eq!(value["preview"].as_str().map(|s| s.chars().count()), Some(103));
        assert_eq!(value["tags"][0], "a");
    }

    #[test]
    fn image_entry_json_carries_data_url() {
        let entry = ClipEntry {
            id: 2,
            content: vec![1, 2, 3],
            kind: EntryKind::Image,
            timestamp: 456,
            favorite: true,
            tags: vec![],
        };
        let value = entry_json(&entry);
        assert_eq!(value["kind"], "image");
        let data = value["image_data"].as_str().expect("data url");
        assert!(data.starts_with("data:image/"));
        assert!(data.contains(";base64,"));
        assert!(value.get("content").is_none());
    }

    #[test]
    fn filter_param_maps_to_entry_filter() {
        let text = filter_from_params(Some("text"), None);
        assert_eq!(text.kind, Some(EntryKind::Text));
        assert!(!text.favorites_only);

        let favorites = filter_from_params(Some("favorites"), Some("q".to_string()));
        assert!(favorites.favorites_only);
        assert_eq!(favorites.search.as_deref(), Some("q"));

        let unknown = filter_from_params(Some("bogus"), None);
        assert!(unknown.kind.is_none());
        assert!(!unknown.favorites_only);
    }
}
