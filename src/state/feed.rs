//! Paged product feed state.
//!
//! Requests run as spawned tasks tagged with a generation. Responses older
//! than the latest page-1 request are discarded, so a slow "load more" can
//! never land on top of a refresh that was issued after it. The rest are
//! committed in issue order: a page that finishes early waits until every
//! older live request has landed.

use std::collections::BTreeMap;
use tokio::task::JoinError;

use crate::app_data::app_data;
use crate::config::FeedConfig;
use crate::picsum::{FeedError, PicsumClient, Product};
use crate::state::{ApiResponse, StateEvent};
use crate::task::TaggedTasks;

/// The page a request asked for and what came back
type PageResult = (u32, Result<Vec<Product>, FeedError>);

/// Paging parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedSettings {
    pub page_size: u32,
    pub max_page_exclusive: u32,
    pub end_reached_threshold: f32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        let feed = &app_data().feed;
        Self {
            page_size: feed.page_size,
            max_page_exclusive: feed.max_page_exclusive,
            end_reached_threshold: feed.end_reached_threshold,
        }
    }
}

impl FeedSettings {
    pub fn from_config(config: &FeedConfig) -> Self {
        Self {
            page_size: config.page_size,
            ..Self::default()
        }
    }
}

/// Scroll position of the list. All fields share one unit (rows or pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset: f32,
    pub visible_length: f32,
    pub content_length: f32,
}

impl Viewport {
    pub fn distance_from_end(&self) -> f32 {
        (self.content_length - self.offset - self.visible_length).max(0.0)
    }
}

/// Feed screen state
pub struct FeedController {
    client: PicsumClient,
    settings: FeedSettings,
    /// Displayed products, in arrival order
    products: Vec<Product>,
    /// Status of the most recent listing request
    response: ApiResponse<Vec<Product>>,
    /// Page cursor
    page: u32,
    /// Whether a pull-to-refresh is outstanding
    refreshing: bool,
    refresh_generation: Option<u64>,
    requests: TaggedTasks<PageResult>,
    /// Finished responses waiting for older requests, by generation
    ready: BTreeMap<u64, Result<PageResult, JoinError>>,
    /// Generation of the latest page-1 request
    replace_floor: u64,
}

impl FeedController {
    pub fn new(client: PicsumClient, settings: FeedSettings) -> Self {
        Self {
            client,
            settings,
            products: Vec::new(),
            response: ApiResponse::default(),
            page: first_page(),
            refreshing: false,
            refresh_generation: None,
            requests: TaggedTasks::default(),
            ready: BTreeMap::new(),
            replace_floor: 0,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn response(&self) -> &ApiResponse<Vec<Product>> {
        &self.response
    }

    /// Current page cursor
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    /// Whether the list footer should show a loading indicator
    pub fn is_loading(&self) -> bool {
        self.response.is_loading()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// Number of requests still outstanding
    pub fn in_flight(&self) -> usize {
        self.requests.len()
    }

    /// Look up a displayed product by id
    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Request one page. Page 1 replaces the list once it arrives; any other
    /// page is appended.
    pub fn fetch_page(&mut self, page: u32) -> StateEvent {
        self.issue(page);
        StateEvent::StatusMessage(format!("Fetching page {}...", page))
    }

    /// Request the page after the cursor, unless that reaches the page cap
    pub fn load_more(&mut self) -> Option<StateEvent> {
        let next = self.page + 1;
        if next >= self.settings.max_page_exclusive {
            tracing::debug!(
                "Not loading page {}: cap is {} (exclusive)",
                next,
                self.settings.max_page_exclusive
            );
            return None;
        }

        self.page = next;
        Some(self.fetch_page(next))
    }

    /// Reset the cursor and reload the first page
    pub fn refresh(&mut self) -> StateEvent {
        let page = first_page();
        self.page = page;
        self.refreshing = true;
        let generation = self.issue(page);
        self.refresh_generation = Some(generation);
        StateEvent::StatusMessage("Refreshing...".to_string())
    }

    /// The manual "get products" action: first page when the list is empty,
    /// otherwise the next page.
    pub fn get_products(&mut self) -> Option<StateEvent> {
        if self.products.is_empty() {
            Some(self.fetch_page(first_page()))
        } else {
            self.load_more()
        }
    }

    /// Scroll callback: loads more once the end of the list is within
    /// `end_reached_threshold` visible lengths.
    pub fn on_end_reached(&mut self, viewport: Viewport) -> Option<StateEvent> {
        if self.products.is_empty() {
            return None;
        }

        let trigger = self.settings.end_reached_threshold * viewport.visible_length;
        if viewport.distance_from_end() <= trigger {
            self.load_more()
        } else {
            None
        }
    }

    /// Apply every finished request without waiting
    pub fn poll(&mut self) -> Vec<StateEvent> {
        self.ready.extend(self.requests.take_finished());
        self.commit_ready()
    }

    /// Wait for all outstanding requests, applying each in issue order
    pub async fn settle(&mut self) -> Vec<StateEvent> {
        let mut events = Vec::new();
        while let Some((generation, joined)) = self.requests.next().await {
            self.ready.insert(generation, joined);
            events.extend(self.commit_ready());
        }
        events
    }

    fn issue(&mut self, page: u32) -> u64 {
        self.response.begin();

        let client = self.client.clone();
        let limit = self.settings.page_size;
        let generation = self.requests.spawn(async move {
            let result = client.fetch_page(page, limit).await;
            (page, result)
        });

        if page == first_page() {
            self.replace_floor = generation;
        }
        tracing::debug!("Issued request {} for page {}", generation, page);
        generation
    }

    /// Apply buffered responses up to the oldest live request still running
    fn commit_ready(&mut self) -> Vec<StateEvent> {
        let blocker = self.requests.oldest_pending_from(self.replace_floor);
        let mut events = Vec::new();

        while let Some(entry) = self.ready.first_entry() {
            if let Some(pending) = blocker.filter(|b| entry.key() > b) {
                tracing::debug!(
                    "Holding response {} until request {} lands",
                    entry.key(),
                    pending
                );
                break;
            }
            let (generation, joined) = entry.remove_entry();
            events.extend(self.apply(generation, joined));
        }

        events
    }

    fn apply(&mut self, generation: u64, joined: Result<PageResult, JoinError>) -> Vec<StateEvent> {
        let mut events = Vec::new();

        if self.refresh_generation == Some(generation) {
            self.refresh_generation = None;
            self.refreshing = false;
        }

        if generation < self.replace_floor {
            tracing::debug!(
                "Discarding stale response {} (replace floor {})",
                generation,
                self.replace_floor
            );
            return events;
        }

        match joined {
            Ok((page, Ok(items))) => {
                let count = items.len();
                if page == first_page() {
                    self.products = items.clone();
                    self.response.succeed(items);
                } else {
                    self.products.extend(items.iter().cloned());
                    let mut data = std::mem::take(&mut self.response.data);
                    data.extend(items);
                    self.response.succeed(data);
                }

                tracing::info!(
                    "Page {} committed: {} new, {} displayed",
                    page,
                    count,
                    self.products.len()
                );
                events.push(StateEvent::ProductsChanged {
                    count: self.products.len(),
                });
                events.push(StateEvent::StatusMessage(format!(
                    "Loaded page {} ({} products)",
                    page, count
                )));
            }
            Ok((page, Err(e))) => {
                let msg = e.to_string();
                tracing::warn!("Failed to fetch page {}: {}", page, msg);
                events.push(StateEvent::LogError(format!(
                    "Failed to fetch page {}: {}",
                    page, msg
                )));
                events.push(StateEvent::StatusMessage(format!("Error: {}", msg)));
                self.response.fail(msg);
            }
            Err(e) => {
                let msg = format!("Fetch task panicked: {}", e);
                tracing::error!("{}", msg);
                events.push(StateEvent::LogError(msg.clone()));
                self.response.fail(msg);
            }
        }

        if self.requests.has_pending_after(generation) {
            self.response.begin();
        }

        events
    }
}

fn first_page() -> u32 {
    app_data().feed.first_page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picsum::test_support::product;
    use crate::state::FetchStatus;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn controller(server: &MockServer) -> FeedController {
        let client = PicsumClient::new(format!("{}/v2", server.uri())).unwrap();
        FeedController::new(client, FeedSettings::default())
    }

    async fn mount_page(server: &MockServer, page: u32, items: Vec<Product>) {
        Mock::given(method("GET"))
            .and(path("/v2/list"))
            .and(query_param("page", page.to_string()))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(items))
            .mount(server)
            .await;
    }

    fn ids(feed: &FeedController) -> Vec<&str> {
        feed.products().iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_first_page_then_load_more() {
        let server = MockServer::start().await;
        let first = Product {
            id: "0".to_string(),
            author: "A".to_string(),
            width: 100,
            height: 100,
            url: "u0".to_string(),
            download_url: "d0".to_string(),
        };
        mount_page(&server, 1, vec![first.clone()]).await;
        mount_page(&server, 2, vec![product("1")]).await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;

        assert_eq!(feed.products(), &[first]);
        assert_eq!(feed.response().status, FetchStatus::Success);

        assert!(feed.load_more().is_some());
        feed.settle().await;

        assert_eq!(ids(&feed), vec!["0", "1"]);
        assert_eq!(feed.page(), 2);
        assert_eq!(feed.response().status, FetchStatus::Success);
    }

    #[tokio::test]
    async fn test_sequential_pages_concatenate_in_order() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("a"), product("b")]).await;
        mount_page(&server, 2, vec![product("c")]).await;
        mount_page(&server, 3, vec![product("d"), product("e")]).await;
        mount_page(&server, 4, vec![product("f")]).await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;
        for _ in 0..3 {
            feed.load_more();
            feed.settle().await;
        }

        assert_eq!(ids(&feed), vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(feed.response().status, FetchStatus::Success);
        assert_eq!(feed.response().data.len(), 6);
    }

    #[tokio::test]
    async fn test_load_more_stops_below_page_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![product("x")]))
            .expect(4)
            .mount(&server)
            .await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;
        for _ in 0..3 {
            assert!(feed.load_more().is_some());
            feed.settle().await;
        }
        assert_eq!(feed.page(), 4);

        assert!(feed.load_more().is_none());
        assert_eq!(feed.page(), 4);
        assert_eq!(feed.in_flight(), 0);
        assert_eq!(feed.products().len(), 4);
    }

    #[tokio::test]
    async fn test_refresh_replaces_list() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("0")]).await;
        mount_page(&server, 2, vec![product("1")]).await;
        mount_page(&server, 3, vec![product("2")]).await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;
        feed.load_more();
        feed.settle().await;
        feed.load_more();
        feed.settle().await;
        assert_eq!(feed.products().len(), 3);

        feed.refresh();
        assert!(feed.is_refreshing());
        feed.settle().await;

        assert_eq!(ids(&feed), vec!["0"]);
        assert_eq!(feed.page(), 1);
        assert!(!feed.is_refreshing());
        assert_eq!(feed.response().data.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_displayed_products() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("0")]).await;
        Mock::given(method("GET"))
            .and(path("/v2/list"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;

        feed.load_more();
        let events = feed.settle().await;

        assert_eq!(ids(&feed), vec!["0"]);
        assert_eq!(feed.response().status, FetchStatus::Fail);
        assert_eq!(
            feed.response().error_message,
            "Server responded with 500 Internal Server Error"
        );
        assert!(feed.response().data.is_empty());
        assert!(events.iter().any(|e| matches!(e, StateEvent::LogError(_))));
    }

    #[tokio::test]
    async fn test_parse_failure_message_is_error_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;

        assert_eq!(feed.response().status, FetchStatus::Fail);
        assert!(feed.response().error_message.starts_with("Invalid listing response"));
        assert!(feed.products().is_empty());
    }

    #[tokio::test]
    async fn test_status_is_loading_while_in_flight() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("0")]).await;

        let mut feed = controller(&server);
        assert_eq!(feed.response().status, FetchStatus::Initial);

        feed.fetch_page(1);
        assert!(feed.is_loading());
        assert_eq!(feed.in_flight(), 1);

        feed.settle().await;
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn test_slow_load_more_discarded_after_refresh() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("0")]).await;
        Mock::given(method("GET"))
            .and(path("/v2/list"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(vec![product("late")])
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;

        feed.load_more();
        feed.refresh();
        assert_eq!(feed.in_flight(), 2);
        feed.settle().await;

        assert_eq!(ids(&feed), vec!["0"]);
        assert_eq!(feed.page(), 1);
        assert_eq!(feed.response().status, FetchStatus::Success);
    }

    #[tokio::test]
    async fn test_status_stays_loading_until_newest_request() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("0")]).await;
        Mock::given(method("GET"))
            .and(path("/v2/list"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(vec![product("1")])
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.load_more();

        // Wait for the fast first page only
        tokio::time::sleep(Duration::from_millis(100)).await;
        feed.poll();
        assert_eq!(ids(&feed), vec!["0"]);
        assert!(feed.is_loading(), "page 2 is still outstanding");

        feed.settle().await;
        assert_eq!(ids(&feed), vec!["0", "1"]);
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn test_out_of_order_appends_keep_page_order() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("p1")]).await;
        Mock::given(method("GET"))
            .and(path("/v2/list"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(vec![product("p2")])
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        mount_page(&server, 3, vec![product("p3")]).await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;

        feed.load_more();
        feed.load_more();
        assert_eq!(feed.page(), 3);

        // Page 3 is back but must wait behind page 2
        tokio::time::sleep(Duration::from_millis(100)).await;
        feed.poll();
        assert_eq!(ids(&feed), vec!["p1"]);
        assert!(feed.is_loading());

        feed.settle().await;
        assert_eq!(ids(&feed), vec!["p1", "p2", "p3"]);
        assert_eq!(feed.response().data.len(), 3);
        assert_eq!(feed.response().status, FetchStatus::Success);
        assert_eq!(feed.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_refresh_releases_held_append() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("fresh")]).await;
        Mock::given(method("GET"))
            .and(path("/v2/list"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(vec![product("p2")])
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        mount_page(&server, 3, vec![product("p3")]).await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;

        feed.load_more();
        feed.load_more();
        tokio::time::sleep(Duration::from_millis(100)).await;
        feed.poll();

        // The refresh supersedes both appends, held or not
        feed.refresh();
        feed.settle().await;

        assert_eq!(ids(&feed), vec!["fresh"]);
        assert_eq!(feed.page(), 1);
        assert_eq!(feed.response().status, FetchStatus::Success);
    }

    #[tokio::test]
    async fn test_end_reached_threshold() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("0")]).await;
        mount_page(&server, 2, vec![product("1")]).await;

        let mut feed = controller(&server);
        let near_end = Viewport {
            offset: 1300.0,
            visible_length: 400.0,
            content_length: 2000.0,
        };
        assert!(feed.on_end_reached(near_end).is_none(), "empty list never pages");

        feed.fetch_page(1);
        feed.settle().await;

        let far = Viewport {
            offset: 0.0,
            visible_length: 400.0,
            content_length: 2000.0,
        };
        assert!(feed.on_end_reached(far).is_none());
        assert_eq!(feed.page(), 1);

        assert!(feed.on_end_reached(near_end).is_some());
        assert_eq!(feed.page(), 2);
        feed.settle().await;
        assert_eq!(ids(&feed), vec!["0", "1"]);
    }

    #[tokio::test]
    async fn test_get_products_button() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("0")]).await;
        mount_page(&server, 2, vec![product("1")]).await;

        let mut feed = controller(&server);
        feed.get_products();
        feed.settle().await;
        assert_eq!(feed.page(), 1);
        assert_eq!(ids(&feed), vec!["0"]);

        feed.get_products();
        feed.settle().await;
        assert_eq!(feed.page(), 2);
        assert_eq!(ids(&feed), vec!["0", "1"]);
    }

    #[tokio::test]
    async fn test_overlapping_pages_are_not_deduplicated() {
        let server = MockServer::start().await;
        mount_page(&server, 1, vec![product("0"), product("1")]).await;
        mount_page(&server, 2, vec![product("1"), product("2")]).await;

        let mut feed = controller(&server);
        feed.fetch_page(1);
        feed.settle().await;
        feed.load_more();
        feed.settle().await;

        assert_eq!(ids(&feed), vec!["0", "1", "1", "2"]);
        assert_eq!(feed.find("2").map(|p| p.author.as_str()), Some("Author 2"));
    }
}
