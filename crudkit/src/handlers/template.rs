//! Generic REST handlers over a record service
//!
//! [`CrudTemplate`] turns any [`RecordService`] into six routes:
//!
//! | Method   | Path    | Operation |
//! |----------|---------|-----------|
//! | `GET`    | `/`     | paginated list, `{"total": n, "data": [...]}` |
//! | `GET`    | `/{id}` | one record, served from the cache when possible |
//! | `POST`   | `/`     | create |
//! | `PUT`    | `/{id}` | full update |
//! | `PATCH`  | `/{id}` | partial update |
//! | `DELETE` | `/{id}` | soft delete |
//!
//! Reads populate the cache under `{ns}:all` and `{ns}:{id}`; writes
//! invalidate them. Failures are rendered as [`AppError`] with a message
//! localized from the request's `Accept-Language`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crudkit::prelude::*;
//!
//! let repository = PgRepository::<Permission>::new(pool);
//! let permissions = CrudTemplate::from_state(&state, Arc::new(CrudService::new(repository)), "permissions")
//!     .with_scope_all(Scope::filter("active", Fragment::with_values("permissions.active = ?", vec![true.into()])));
//!
//! let app = Router::new().nest("/permissions", permissions.router());
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, Extensions, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use super::error::AppError;
use super::query::QueryParams;
use crate::cache::{CacheKeys, ResponseCache};
use crate::i18n::{self, codes, language_from_header, Localizer, DEFAULT_LANGUAGE};
use crate::repository::{
    Changeset, FieldCoercion, Record, RecordId, RepositoryError, RepositoryErrorKind, Scope,
};
use crate::service::{DeleteRecord, ListRecords, ReadRecord, RecordService, WriteRecord};
use crate::state::AppState;
use crate::types::PhoneNumber;

/// Caller's language id, inserted into request extensions upstream
///
/// Written into [`Record::LANGUAGE_FIELD`] on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageId(pub i64);

/// REST handlers for one record type
pub struct CrudTemplate<T, S> {
    service: Arc<S>,
    cache: ResponseCache,
    localizer: Option<Arc<dyn Localizer>>,
    keys: CacheKeys,
    scope_all: Scope,
    scope_one: Scope,
    _record: PhantomData<fn() -> T>,
}

impl<T, S> Clone for CrudTemplate<T, S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cache: self.cache.clone(),
            localizer: self.localizer.clone(),
            keys: self.keys.clone(),
            scope_all: self.scope_all.clone(),
            scope_one: self.scope_one.clone(),
            _record: PhantomData,
        }
    }
}

impl<T, S> CrudTemplate<T, S>
where
    T: Record + Serialize + DeserializeOwned,
    S: RecordService<T> + 'static,
{
    /// Handlers without cache or localizer under cache namespace `namespace`
    pub fn new(service: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            service,
            cache: ResponseCache::disabled(),
            localizer: None,
            keys: CacheKeys::new(namespace),
            scope_all: Scope::none(),
            scope_one: Scope::none(),
            _record: PhantomData,
        }
    }

    /// Handlers sharing the application's cache and localizer
    pub fn from_state(state: &AppState, service: Arc<S>, namespace: impl Into<String>) -> Self {
        let mut template = Self::new(service, namespace).with_cache(state.cache().clone());
        template.localizer = state.localizer();
        template
    }

    #[must_use]
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = Some(localizer);
        self
    }

    /// Scope applied to listings
    #[must_use]
    pub fn with_scope_all(mut self, scope: Scope) -> Self {
        self.scope_all = scope;
        self
    }

    /// Scope applied to single-record reads and to the re-read after writes
    #[must_use]
    pub fn with_scope_one(mut self, scope: Scope) -> Self {
        self.scope_one = scope;
        self
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/", get(list::<T, S>).post(create::<T, S>))
            .route(
                "/{id}",
                get(detail::<T, S>)
                    .put(update::<T, S>)
                    .patch(partial_update::<T, S>)
                    .delete(delete::<T, S>),
            )
            .with_state(Arc::new(self))
    }

    /// Paginated listing; writes `{ns}:all`
    pub async fn find_all(&self, params: &QueryParams, lang: &str) -> Result<Response, AppError> {
        let pager = params.pager();
        let order = params.order::<T>();
        let searcher = params.searcher::<T>();

        let page = self
            .service
            .find_all(&pager, &order, &self.scope_all, searcher.as_ref())
            .await
            .map_err(|err| {
                tracing::debug!(table = T::TABLE, error = %err, "Listing failed");
                AppError::localized(
                    codes::COULD_NOT_FETCH_RECORDS,
                    self.localize(lang, codes::COULD_NOT_FETCH_RECORDS, &self.table_data()),
                )
            })?;

        self.cache.set(&self.keys.all(), &page.items).await;
        Ok(Json(page).into_response())
    }

    /// One active record; served from `{ns}:{id}` unless `redisStop` is set
    pub async fn find_one(
        &self,
        id: RecordId,
        params: &QueryParams,
        lang: &str,
    ) -> Result<Response, AppError> {
        let key = self.keys.one(id);
        if !params.redis_stop {
            if let Some(cached) = self.cache.get(&key).await {
                return Ok((
                    [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
                    cached,
                )
                    .into_response());
            }
        }

        let record = self
            .service
            .find_one(id, &self.scope_one)
            .await
            .map_err(|err| match err.kind {
                RepositoryErrorKind::NotFound => self
                    .failure(&err, lang, codes::FAILED_TO_FETCH_ONE_RECORD, id)
                    .with_status(StatusCode::NOT_FOUND),
                _ => self.failure(&err, lang, codes::DEFAULT_MESSAGE, id),
            })?;

        self.cache.set(&key, &record).await;
        Ok(Json(record).into_response())
    }

    /// Create from a JSON object body; invalidates `{ns}:all`
    pub async fn create(
        &self,
        body: &[u8],
        language: Option<LanguageId>,
        lang: &str,
    ) -> Result<Response, AppError> {
        let mut object = parse_object(body)?;
        if let (Some(field), Some(LanguageId(language))) = (T::LANGUAGE_FIELD, language) {
            object.insert(field.to_string(), Value::from(language));
        }
        let record: T = serde_json::from_value(Value::Object(object)).map_err(AppError::bind)?;

        let created = self
            .service
            .create(&self.scope_one, record)
            .await
            .map_err(|err| self.failure(&err, lang, codes::FAILED_TO_CREATE_RECORD, 0))?;

        self.cache.unset(&self.keys.all()).await;
        Ok(Json(created).into_response())
    }

    /// Update from a JSON object body; invalidates both cache slots
    ///
    /// Read-only keys are dropped and field coercions applied before the
    /// body is decoded. With `partial`, only the keys present in the body
    /// are written. Responds with the sanitized body.
    pub async fn update(
        &self,
        id: RecordId,
        body: &[u8],
        partial: bool,
        lang: &str,
    ) -> Result<Response, AppError> {
        let object = sanitize::<T>(parse_object(body)?);
        let record: T =
            serde_json::from_value(Value::Object(object.clone())).map_err(AppError::bind)?;

        let result = if partial {
            let keys: Vec<&str> = object.keys().map(String::as_str).collect();
            match Changeset::partial(&record, &keys) {
                Ok(changes) => self.service.partial_update(id, &self.scope_one, changes).await,
                Err(err) => Err(err),
            }
        } else {
            self.service.update(id, &self.scope_one, record).await
        };
        result.map_err(|err| self.failure(&err, lang, codes::FAILED_TO_UPDATE_RECORD, id))?;

        self.invalidate(id).await;
        Ok(Json(Value::Object(object)).into_response())
    }

    /// Soft delete; invalidates both cache slots and returns the deleted record
    pub async fn delete(&self, id: RecordId, lang: &str) -> Result<Response, AppError> {
        let deleted = self
            .service
            .delete(id)
            .await
            .map_err(|err| self.failure(&err, lang, codes::FAILED_TO_DELETE_RECORD, id))?;

        self.invalidate(id).await;
        Ok(Json(deleted).into_response())
    }

    async fn invalidate(&self, id: RecordId) {
        self.cache.unset(&self.keys.all()).await;
        self.cache.unset(&self.keys.one(id)).await;
    }

    fn localize(&self, lang: &str, code: &str, data: &i18n::MessageData<'_>) -> String {
        i18n::localize(self.localizer.as_deref(), lang, code, data)
    }

    fn failure(&self, err: &RepositoryError, lang: &str, code: &str, id: RecordId) -> AppError {
        let message = self.localize(lang, code, &self.record_data(id));
        AppError::from_repository(err, message).with_status(i18n::status_for_code(code))
    }

    fn table_data(&self) -> [(&'static str, String); 1] {
        [("Table", T::TABLE.to_string())]
    }

    fn record_data(&self, id: RecordId) -> [(&'static str, String); 2] {
        [("Table", T::TABLE.to_string()), ("ID", id.to_string())]
    }
}

/// Path id; anything unparseable becomes 0, which never exists
fn parse_id(raw: &str) -> RecordId {
    raw.trim().parse().unwrap_or(0)
}

fn language(headers: &HeaderMap) -> String {
    headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .map(language_from_header)
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    match serde_json::from_slice::<Value>(body).map_err(AppError::bind)? {
        Value::Object(object) => Ok(object),
        other => Err(AppError::bind(format!(
            "expected a JSON object, found {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Drop read-only keys and apply the record's field coercions
fn sanitize<T: Record>(mut object: Map<String, Value>) -> Map<String, Value> {
    object.retain(|key, _| !T::is_read_only(key));
    for (field, coercion) in T::coercions() {
        if let Some(value) = object.get_mut(*field) {
            *value = match coercion {
                FieldCoercion::PhoneNumber => PhoneNumber::coerce_value(value.take()),
            };
        }
    }
    object
}

async fn list<T, S>(
    State(template): State<Arc<CrudTemplate<T, S>>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, AppError>
where
    T: Record + Serialize + DeserializeOwned,
    S: RecordService<T> + 'static,
{
    let params = QueryParams::parse(query.as_deref());
    template.find_all(&params, &language(&headers)).await
}

async fn detail<T, S>(
    State(template): State<Arc<CrudTemplate<T, S>>>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, AppError>
where
    T: Record + Serialize + DeserializeOwned,
    S: RecordService<T> + 'static,
{
    let params = QueryParams::parse(query.as_deref());
    template
        .find_one(parse_id(&id), &params, &language(&headers))
        .await
}

async fn create<T, S>(
    State(template): State<Arc<CrudTemplate<T, S>>>,
    extensions: Extensions,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError>
where
    T: Record + Serialize + DeserializeOwned,
    S: RecordService<T> + 'static,
{
    let language_id = extensions.get::<LanguageId>().copied();
    template
        .create(&body, language_id, &language(&headers))
        .await
}

async fn update<T, S>(
    State(template): State<Arc<CrudTemplate<T, S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError>
where
    T: Record + Serialize + DeserializeOwned,
    S: RecordService<T> + 'static,
{
    template
        .update(parse_id(&id), &body, false, &language(&headers))
        .await
}

async fn partial_update<T, S>(
    State(template): State<Arc<CrudTemplate<T, S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError>
where
    T: Record + Serialize + DeserializeOwned,
    S: RecordService<T> + 'static,
{
    template
        .update(parse_id(&id), &body, true, &language(&headers))
        .await
}

async fn delete<T, S>(
    State(template): State<Arc<CrudTemplate<T, S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError>
where
    T: Record + Serialize + DeserializeOwned,
    S: RecordService<T> + 'static,
{
    template.delete(parse_id(&id), &language(&headers)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::cache::MemoryCache;
    use crate::i18n::MessageCatalog;
    use crate::repository::memory::{MemoryRepository, Thing};
    use crate::repository::RepositoryOperation;
    use crate::service::CrudService;

    type Service = CrudService<Thing, MemoryRepository<Thing>>;

    struct Fixture {
        app: Router,
        service: Arc<Service>,
        store: Arc<MemoryCache>,
    }

    fn catalog() -> MessageCatalog {
        MessageCatalog::new("en")
            .with_messages(
                "en",
                [
                    (codes::COULD_NOT_FETCH_RECORDS, "Could not fetch {Table}"),
                    (codes::FAILED_TO_FETCH_ONE_RECORD, "{Table} #{ID} not found"),
                    (codes::FAILED_TO_CREATE_RECORD, "Could not create {Table}"),
                    (codes::FAILED_TO_DELETE_RECORD, "Could not delete {Table} #{ID}"),
                    (codes::DEFAULT_MESSAGE, "Something went wrong"),
                ],
            )
            .with_messages("ky", [(codes::FAILED_TO_FETCH_ONE_RECORD, "{Table} #{ID} табылган жок")])
    }

    fn fixture_with(store: MemoryCache) -> Fixture {
        let service = Arc::new(CrudService::new(MemoryRepository::new()));
        let store = Arc::new(store);
        let app = CrudTemplate::new(Arc::clone(&service), "things")
            .with_cache(ResponseCache::new(store.clone(), Duration::from_secs(3600)))
            .with_localizer(Arc::new(catalog()))
            .router();
        Fixture { app, service, store }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryCache::default())
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(app, request).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn create_thing(app: &Router, code: &str, name: &str) -> Value {
        let (status, body) = send_json(
            app,
            request("POST", "/", Some(json!({"code": code, "name": name, "active": true}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn test_list_envelope_and_cache_write() {
        let fx = fixture();
        create_thing(&fx.app, "a", "ann").await;
        create_thing(&fx.app, "b", "bob").await;

        let (status, body) = send_json(&fx.app, request("GET", "/?page=2&page_size=1", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["name"], "bob");

        let cached: Value = serde_json::from_str(&fx.store.value("things:all").unwrap()).unwrap();
        assert_eq!(cached, json!({"data": body["data"]}));
        assert_eq!(fx.store.ttl("things:all"), Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_list_failure_is_localized_404() {
        let fx = fixture();
        fx.service.repository().fail_next(RepositoryError::new(
            RepositoryOperation::FindAll,
            RepositoryErrorKind::DatabaseError,
            "relation \"things\" does not exist",
        ));

        let (status, body) = send_json(&fx.app, request("GET", "/", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({"error": {
                "Error": "exception:could-not-fetch-records",
                "Code": 404,
                "Message": "Could not fetch things",
            }})
        );
        assert!(fx.store.value("things:all").is_none());
    }

    #[tokio::test]
    async fn test_detail_reads_through_cache() {
        let fx = fixture();
        let created = create_thing(&fx.app, "a", "ann").await;
        let id = created["id"].as_i64().unwrap();
        let uri = format!("/{id}");

        let (status, body) = send_json(&fx.app, request("GET", &uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, created);
        let cached: Value = serde_json::from_str(&fx.store.value(&format!("things:{id}")).unwrap()).unwrap();
        assert_eq!(cached, json!({"data": created}));

        // A hit is returned verbatim, envelope included
        let planted = r#"{"data":{"id":1,"name":"cached"}}"#;
        fx.store.insert(&format!("things:{id}"), planted);
        let (status, body) = send(&fx.app, request("GET", &uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, planted);

        let (_, body) = send_json(&fx.app, request("GET", &format!("{uri}?redisStop=1"), None)).await;
        assert_eq!(body["name"], "ann");
    }

    #[tokio::test]
    async fn test_detail_not_found() {
        let fx = fixture();
        let (status, body) = send_json(&fx.app, request("GET", "/99", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["Code"], 404);
        assert_eq!(body["error"]["Message"], "things #99 not found");

        let request = Request::builder()
            .uri("/abc")
            .header(header::ACCEPT_LANGUAGE, "ru,KY")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send_json(&fx.app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["Message"], "things #0 табылган жок");
    }

    #[tokio::test]
    async fn test_create_rejects_non_objects() {
        let fx = fixture();
        for body in ["[1, 2]", "{", "\"text\""] {
            let request = Request::builder()
                .method("POST")
                .uri("/")
                .body(Body::from(body))
                .unwrap();
            let (status, value) = send_json(&fx.app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(value["error"]["Message"], "Bind error");
        }
        assert_eq!(fx.service.repository().len(), 0);
    }

    #[tokio::test]
    async fn test_create_injects_language_and_invalidates_listing() {
        let fx = fixture();
        fx.store.insert("things:all", r#"{"data":[]}"#);

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .extension(LanguageId(3))
            .body(Body::from(r#"{"code": "a", "name": "ann", "id_language": 1}"#))
            .unwrap();
        let (status, body) = send_json(&fx.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id_language"], 3);
        assert!(fx.store.value("things:all").is_none());

        let created = create_thing(&fx.app, "b", "bob").await;
        assert_eq!(created["id_language"], Value::Null);
    }

    #[tokio::test]
    async fn test_create_failure_carries_driver_detail() {
        let fx = fixture();
        fx.service.repository().fail_next(
            RepositoryError::new(
                RepositoryOperation::Create,
                RepositoryErrorKind::AlreadyExists,
                "duplicate key value violates unique constraint \"things_code_key\"",
            )
            .with_detail("Key (code)=(a) already exists."),
        );

        let (status, body) = send_json(
            &fx.app,
            request("POST", "/", Some(json!({"code": "a", "name": "ann"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["Message"], "Could not create things");
        assert_eq!(body["error"]["Detailed"], "Key (code)=(a) already exists.");
        assert_eq!(body["error"]["FieldName"], "Code");
    }

    #[tokio::test]
    async fn test_partial_update_sanitizes_body() {
        let fx = fixture();
        let created = create_thing(&fx.app, "a", "ann").await;
        let id = created["id"].as_i64().unwrap();
        fx.store.insert("things:all", "{}");
        fx.store.insert(&format!("things:{id}"), "{}");

        let (status, body) = send_json(
            &fx.app,
            request(
                "PATCH",
                &format!("/{id}"),
                Some(json!({
                    "id": 99,
                    "name": "bob",
                    "phone": {"Number": "+996 555 123 456"},
                    "created_at": "2020-01-01",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"name": "bob", "phone": "996555123456"}));
        assert!(fx.store.value("things:all").is_none());
        assert!(fx.store.value(&format!("things:{id}")).is_none());

        let (_, stored) = send_json(&fx.app, request("GET", &format!("/{id}"), None)).await;
        assert_eq!(stored["id"], id);
        assert_eq!(stored["code"], "a");
        assert_eq!(stored["name"], "bob");
        assert_eq!(stored["phone"], "996555123456");
    }

    #[tokio::test]
    async fn test_full_update_replaces_columns() {
        let fx = fixture();
        let created = create_thing(&fx.app, "a", "ann").await;
        let id = created["id"].as_i64().unwrap();

        let (status, _) = send_json(
            &fx.app,
            request("PUT", &format!("/{id}"), Some(json!({"name": "bob"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, stored) = send_json(&fx.app, request("GET", &format!("/{id}?redisStop=1"), None)).await;
        assert_eq!(stored["name"], "bob");
        assert_eq!(stored["code"], "");
        assert_eq!(stored["active"], false);

        let (status, body) = send_json(
            &fx.app,
            request("PUT", "/404", Some(json!({"name": "bob"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["Message"], "Something went wrong");
    }

    #[tokio::test]
    async fn test_delete_invalidates_and_hides_record() {
        let fx = fixture();
        let created = create_thing(&fx.app, "a", "ann").await;
        let id = created["id"].as_i64().unwrap();
        send(&fx.app, request("GET", &format!("/{id}"), None)).await;
        assert!(fx.store.value(&format!("things:{id}")).is_some());

        let (status, body) = send_json(&fx.app, request("DELETE", &format!("/{id}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
        assert!(fx.store.value(&format!("things:{id}")).is_none());

        let (status, _) = send_json(&fx.app, request("GET", &format!("/{id}"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send_json(&fx.app, request("DELETE", &format!("/{id}"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["Message"], format!("Could not delete things #{id}"));
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_requests() {
        let fx = fixture_with(MemoryCache::failing());
        let created = create_thing(&fx.app, "a", "ann").await;
        let id = created["id"].as_i64().unwrap();
        let (status, body) = send_json(&fx.app, request("GET", &format!("/{id}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "ann");
    }

    #[test]
    fn test_sanitize_drops_read_only_keys() {
        let object = json!({"id": 1, "deleted_at": null, "name": "x", "phone": "0555"});
        let Value::Object(object) = object else { unreachable!() };
        let sanitized = sanitize::<Thing>(object);
        assert_eq!(Value::Object(sanitized), json!({"name": "x", "phone": "0555"}));
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), 42);
        assert_eq!(parse_id("4x"), 0);
        assert_eq!(parse_id(""), 0);
    }
}
