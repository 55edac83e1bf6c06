// src/services/timetable.rs

//! Timetable service client.
//!
//! Talks to the `timetable_export.cgi` JSON export for schedules and
//! directory listings, and to the HTML timetable page for meeting links.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, REFERER};
use tokio::sync::Mutex;
use url::Url;

use super::extract::normalize_name;
use super::links::{LinkMap, parse_links_page};
use super::mapper::map_items;
use crate::error::{AppError, Result};
use crate::models::{
    Config, DateRange, DirectoryEntry, DirectoryObject, EntityKind, Event, ExportEnvelope,
    ExportRoot, RawItem, TrackedEntity,
};
use crate::utils::http::{create_async_client, decode_body, encode_cp1251_form_value};
use crate::utils::time::today;

/// Result of one schedule fetch.
///
/// `Fetched(vec![])` means the service answered with nothing scheduled;
/// `Failed` means there is no information this cycle.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Vec<Event>),
    Failed(AppError),
}

impl FetchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }

    /// Events of a successful fetch, `None` on failure.
    pub fn into_events(self) -> Option<Vec<Event>> {
        match self {
            FetchOutcome::Fetched(events) => Some(events),
            FetchOutcome::Failed(_) => None,
        }
    }
}

/// Anything that can produce an entity's schedule.
///
/// Jobs depend on this rather than on [`TimetableClient`] directly.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Fetch a schedule; `None` selects the default window.
    async fn fetch_schedule(
        &self,
        entity: &TrackedEntity,
        range: Option<DateRange>,
    ) -> FetchOutcome;
}

#[derive(Debug)]
struct DirectoryCache {
    teachers: Vec<DirectoryObject>,
    rooms: Vec<DirectoryObject>,
    fetched_at: Instant,
}

/// Client for the upstream timetable service.
pub struct TimetableClient {
    config: Arc<Config>,
    client: Client,
    directory: Mutex<Option<DirectoryCache>>,
}

impl TimetableClient {
    /// Create a client; fails only if the HTTP client cannot be built.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = create_async_client(&config.timetable)?;
        Ok(Self {
            config,
            client,
            directory: Mutex::new(None),
        })
    }

    /// Fetch and map the schedule of one entity over a date range.
    ///
    /// Never returns an error: transport, status and payload failures are
    /// logged and reported as [`FetchOutcome::Failed`].
    pub async fn fetch(
        &self,
        entity_id: &str,
        kind: EntityKind,
        range: DateRange,
        links: &LinkMap,
    ) -> FetchOutcome {
        match self.fetch_items(entity_id, kind, range).await {
            Ok(items) => {
                let events = map_items(&items, kind, links);
                log::debug!(
                    "Fetched {} {}: {} records, {} events",
                    kind,
                    entity_id,
                    items.len(),
                    events.len()
                );
                FetchOutcome::Fetched(events)
            }
            Err(error) => {
                log::warn!("Schedule fetch failed for {} {}: {}", kind, entity_id, error);
                FetchOutcome::Failed(error)
            }
        }
    }

    /// `[today - lookback, today + lookahead]` in timetable civil time.
    pub fn default_range(&self) -> DateRange {
        let cfg = &self.config.timetable;
        DateRange::around(today(), cfg.lookback_days, cfg.lookahead_days)
    }

    /// Resolve a group name to its upstream id.
    ///
    /// Names are compared after [`normalize_name`], so spacing, dash style
    /// and Latin look-alike letters do not matter.
    pub async fn find_group_id(&self, group_name: &str) -> Result<Option<String>> {
        let target = normalize_name(group_name);
        let root = self.fetch_object_list(EntityKind::Group).await?;

        let id = root
            .departments
            .into_iter()
            .flat_map(|dept| dept.objects)
            .find(|obj| normalize_name(obj.name.as_deref().unwrap_or("")) == target)
            .and_then(|obj| obj.id);

        Ok(id)
    }

    /// Search teachers and rooms by normalized substring.
    ///
    /// Listings are cached for `directory_ttl_secs`. Teachers come first;
    /// at most `search_limit` entries are returned.
    pub async fn search_directory(&self, query: &str) -> Result<Vec<DirectoryEntry>> {
        let needle = normalize_name(query);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let ttl = Duration::from_secs(self.config.timetable.directory_ttl_secs);
        let mut cache = self.directory.lock().await;

        let stale = cache
            .as_ref()
            .is_none_or(|c| c.fetched_at.elapsed() > ttl);
        if stale {
            let (teachers, rooms) = futures::future::try_join(
                self.fetch_object_list(EntityKind::Teacher),
                self.fetch_object_list(EntityKind::Room),
            )
            .await?;

            let teachers: Vec<_> = teachers
                .departments
                .into_iter()
                .flat_map(|g| g.objects)
                .collect();
            let rooms: Vec<_> = rooms.blocks.into_iter().flat_map(|g| g.objects).collect();
            log::info!(
                "Directory refreshed: {} teachers, {} rooms",
                teachers.len(),
                rooms.len()
            );

            *cache = Some(DirectoryCache {
                teachers,
                rooms,
                fetched_at: Instant::now(),
            });
        }

        let Some(directory) = cache.as_ref() else {
            return Ok(Vec::new());
        };

        let teachers = directory
            .teachers
            .iter()
            .map(|obj| (EntityKind::Teacher, obj));
        let rooms = directory.rooms.iter().map(|obj| (EntityKind::Room, obj));

        let results = teachers
            .chain(rooms)
            .filter_map(|(kind, obj)| {
                let name = obj.name.as_deref()?;
                let id = obj.id.as_deref()?;
                normalize_name(name)
                    .contains(&needle)
                    .then(|| DirectoryEntry {
                        kind,
                        name: name.to_string(),
                        id: id.to_string(),
                    })
            })
            .take(self.config.timetable.search_limit)
            .collect();

        Ok(results)
    }

    /// Scrape surname-keyed meeting links from the HTML timetable of a group.
    pub async fn fetch_links_map(&self, group_name: &str) -> Result<LinkMap> {
        let cfg = &self.config.timetable;
        let base_url = Url::parse(&cfg.html_url)
            .map_err(|e| AppError::config(format!("invalid html_url: {e}")))?;

        let body = format!(
            "n=700&faculty=0&teacher=&course=0&group={}&sdate=&edate=",
            encode_cp1251_form_value(group_name)
        );

        let response = self
            .client
            .post(base_url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(REFERER, cfg.html_url.as_str())
            .timeout(Duration::from_secs(cfg.links_timeout_secs))
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        let html = decode_body(&response.bytes().await?)?;
        parse_links_page(&html, &base_url)
    }

    async fn fetch_items(
        &self,
        entity_id: &str,
        kind: EntityKind,
        range: DateRange,
    ) -> Result<Vec<RawItem>> {
        let begin = range.start.format("%d.%m.%Y").to_string();
        let end = range.end.format("%d.%m.%Y").to_string();
        let params = [
            ("req_type", "rozklad"),
            ("req_mode", kind.req_mode()),
            ("OBJ_ID", entity_id),
            ("ros_text", "separated"),
            ("begin_date", begin.as_str()),
            ("end_date", end.as_str()),
            ("req_format", "json"),
            ("coding_mode", "UTF8"),
            ("bs", "ok"),
        ];

        let root = self
            .get_export(&params, &format!("{kind} {entity_id}"))
            .await?;
        Ok(root.roz_items)
    }

    async fn fetch_object_list(&self, kind: EntityKind) -> Result<ExportRoot> {
        let params = [
            ("req_type", "obj_list"),
            ("req_mode", kind.req_mode()),
            ("show_ID", "yes"),
            ("req_format", "json"),
            ("coding_mode", "WINDOWS-1251"),
            ("bs", "ok"),
        ];
        self.get_export(&params, &format!("{kind} list")).await
    }

    async fn get_export(&self, params: &[(&str, &str)], context: &str) -> Result<ExportRoot> {
        let response = self
            .client
            .get(&self.config.timetable.api_url)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::fetch(context, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(context, format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::fetch(context, e))?;
        let text = decode_body(&bytes)?;

        let envelope: ExportEnvelope =
            serde_json::from_str(&text).map_err(|e| AppError::parse(context, e))?;
        envelope
            .root
            .ok_or_else(|| AppError::parse(context, "export root object missing"))
    }
}

#[async_trait]
impl ScheduleSource for TimetableClient {
    /// Fetch an entity's schedule, resolving meeting links for groups.
    ///
    /// Without an explicit range the configured window around today is
    /// used.
    async fn fetch_schedule(
        &self,
        entity: &TrackedEntity,
        range: Option<DateRange>,
    ) -> FetchOutcome {
        let range = range.unwrap_or_else(|| self.default_range());

        let links = match (entity.kind, entity.name.as_deref()) {
            (EntityKind::Group, Some(name)) if !name.trim().is_empty() => {
                self.fetch_links_map(name).await.unwrap_or_else(|e| {
                    log::warn!("Meeting link lookup failed for {}: {}", name, e);
                    LinkMap::new()
                })
            }
            _ => LinkMap::new(),
        };

        self.fetch(&entity.id, entity.kind, range, &links).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimetableConfig;
    use chrono::NaiveDate;
    use encoding_rs::WINDOWS_1251;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EXPORT_PATH: &str = "/cgi-bin/timetable_export.cgi";
    const HTML_PATH: &str = "/cgi-bin/timetable.cgi";

    fn client_for(server: &MockServer) -> TimetableClient {
        let config = Config {
            timetable: TimetableConfig {
                api_url: format!("{}{}", server.uri(), EXPORT_PATH),
                html_url: format!("{}{}?n=700", server.uri(), HTML_PATH),
                timeout_secs: 2,
                links_timeout_secs: 2,
                ..TimetableConfig::default()
            },
            ..Config::default()
        };
        TimetableClient::new(Arc::new(config)).unwrap()
    }

    fn october() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 25).unwrap(),
        )
    }

    const SCHEDULE: &str = r#"{
        "psrozklad_export": {
            "roz_items": [
                {
                    "object": "КІ-24-1",
                    "date": "21.10.2026",
                    "lesson_time": "10:00-11:20",
                    "lesson_description": "Фізика (Пр) доцент Коваль Олег Петрович 214.ауд."
                },
                {
                    "object": "КІ-24-1",
                    "date": "20.10.2026",
                    "lesson_time": "08:30-09:50",
                    "lesson_description": "Вища математика (Л) 101.ауд."
                },
                {
                    "object": "КІ-24-1",
                    "date": "bad",
                    "lesson_time": "08:30-09:50",
                    "lesson_description": "Хімія"
                }
            ]
        }
    }"#;

    #[tokio::test]
    async fn test_fetch_maps_and_orders_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EXPORT_PATH))
            .and(query_param("req_type", "rozklad"))
            .and(query_param("req_mode", "group"))
            .and(query_param("OBJ_ID", "-4242"))
            .and(query_param("begin_date", "19.10.2026"))
            .and(query_param("end_date", "25.10.2026"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SCHEDULE))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client
            .fetch("-4242", EntityKind::Group, october(), &LinkMap::new())
            .await;

        let events = outcome.into_events().expect("fetch should succeed");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].subject(), "Вища математика");
        assert_eq!(events[1].subject(), "Фізика");
        assert_eq!(events[1].teacher(), "доцент Коваль Олег Петрович");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_empty_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EXPORT_PATH))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client
            .fetch("-4242", EntityKind::Group, october(), &LinkMap::new())
            .await;
        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn test_fetch_bad_json_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EXPORT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client
            .fetch("-4242", EntityKind::Group, october(), &LinkMap::new())
            .await;
        assert!(matches!(outcome, FetchOutcome::Failed(AppError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_fetch_empty_schedule_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EXPORT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"ps_rozklad_export": {"roz_items": []}}"#),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client
            .fetch("-4242", EntityKind::Group, october(), &LinkMap::new())
            .await;
        assert_eq!(outcome.into_events().map(|e| e.len()), Some(0));
    }

    #[tokio::test]
    async fn test_find_group_id_decodes_cp1251() {
        let server = MockServer::start().await;
        let body = r#"{"psrozklad_export": {"departments": [
            {"name": "Кафедра інформатики", "objects": [{"name": "КІ-23-1", "ID": "-100"}, {"name": "КІ-24-1", "ID": -4242}]}
        ]}}"#;
        let (bytes, _, _) = WINDOWS_1251.encode(body);

        Mock::given(method("GET"))
            .and(path(EXPORT_PATH))
            .and(query_param("req_type", "obj_list"))
            .and(query_param("req_mode", "group"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.into_owned()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(
            client.find_group_id("ki-24-1").await.unwrap(),
            Some("-4242".to_string())
        );
        assert_eq!(client.find_group_id("КІ-99-9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_directory_teachers_first_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EXPORT_PATH))
            .and(query_param("req_mode", "teacher"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"psrozklad_export": {"departments": [{"objects": [
                    {"name": "Коваль Олег Петрович", "ID": "11"},
                    {"name": "Шевчук Марія Іванівна", "ID": "12"}
                ]}]}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(EXPORT_PATH))
            .and(query_param("req_mode", "room"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"psrozklad_export": {"blocks": [{"objects": [
                    {"name": "Коваль-лаб 214", "ID": "501"}
                ]}]}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let found = client.search_directory("коваль").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, EntityKind::Teacher);
        assert_eq!(found[0].id, "11");
        assert_eq!(found[1].kind, EntityKind::Room);

        // served from the in-memory directory
        let again = client.search_directory("шевчук").await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].name, "Шевчук Марія Іванівна");
    }

    #[tokio::test]
    async fn test_fetch_schedule_attaches_links_for_groups() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HTML_PATH))
            .and(body_string_contains("group=%CA%B2-24-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body>доцент Коваль О.П.<br>
                <div class="link"><a href="https://zoom.us/j/777">zoom</a></div>
                </body></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(EXPORT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(SCHEDULE))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let entity = TrackedEntity::group("-4242", "КІ-24-1");
        let events = client
            .fetch_schedule(&entity, Some(october()))
            .await
            .into_events()
            .unwrap();

        let physics = events.iter().find(|e| e.subject() == "Фізика").unwrap();
        assert_eq!(physics.links(), &["https://zoom.us/j/777".to_string()]);
        let maths = events.iter().find(|e| e.subject() == "Вища математика").unwrap();
        assert!(maths.links().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_schedule_survives_link_page_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HTML_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(EXPORT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(SCHEDULE))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let entity = TrackedEntity::group("-4242", "КІ-24-1");
        let outcome = client.fetch_schedule(&entity, Some(october())).await;
        assert_eq!(outcome.into_events().map(|e| e.len()), Some(2));
    }
}
