use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Stats {
    health: i64,
    happiness: i64,
    mental_state: i64,
    hunger: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Post {
    id: String,
    date: String,
    time: String,
    episode: String,
    parameters: Stats,
}

#[derive(Debug, Deserialize)]
struct PostChange {
    post: Post,
    status: Stats,
}

#[derive(Debug, Deserialize)]
struct PostList {
    count: usize,
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct CalendarDay {
    date: String,
    post_count: usize,
}

#[derive(Debug, Deserialize)]
struct Calendar {
    month: String,
    days: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
struct Trends {
    last_7_days: Vec<serde_json::Value>,
    weekly_totals: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    user_id: String,
    user_name: String,
    post_count: usize,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));
static USER_SEQ: AtomicUsize = AtomicUsize::new(0);

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("self_diary_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

/// Each test works against its own user so tests can share one server.
fn fresh_user(tag: &str) -> String {
    format!("{tag}-{}", USER_SEQ.fetch_add(1, AtomicOrdering::SeqCst))
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/users/probe/status")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_self_diary"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env("APP_DEFAULT_USER", "web")
        .env_remove("GEMINI_API_KEY")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn create_post(client: &Client, base: &str, user: &str, body: serde_json::Value) -> PostChange {
    let response = client
        .post(format!("{base}/api/users/{user}/posts"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "create failed: {}", response.status());
    response.json().await.unwrap()
}

#[tokio::test]
async fn http_new_user_starts_with_initial_status() {
    let server = shared_server().await;
    let client = Client::new();
    let user = fresh_user("initial");

    let status: Stats = client
        .get(format!("{}/api/users/{user}/status", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        status,
        Stats {
            health: 100,
            happiness: 50,
            mental_state: 25,
            hunger: 10
        }
    );
}

#[tokio::test]
async fn http_post_lifecycle_tracks_status() {
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;
    let user = fresh_user("lifecycle");

    let created = create_post(
        &client,
        base,
        &user,
        json!({
            "episode": "  Skipped lunch, long walk  ",
            "date": "2026-03-02",
            "time": "13:05",
            "parameters": { "health": -10, "hunger": -5 }
        }),
    )
    .await;
    assert_eq!(created.post.episode, "Skipped lunch, long walk");
    assert_eq!(created.post.date, "2026-03-02");
    assert_eq!(created.post.time, "13:05");
    assert_eq!(created.post.parameters.happiness, 0);
    assert_eq!(created.status.health, 90);
    assert_eq!(created.status.hunger, 5);

    let updated: PostChange = client
        .put(format!("{base}/api/users/{user}/posts/{}", created.post.id))
        .json(&json!({ "parameters": { "health": -3 } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated.post.parameters.health, -3);
    assert_eq!(updated.post.parameters.hunger, -5);
    assert_eq!(updated.status.health, 97);

    let list: PostList = client
        .get(format!("{base}/api/users/{user}/posts?month=2026-03"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.count, 1);
    assert_eq!(list.posts[0].id, created.post.id);

    let response = client
        .delete(format!("{base}/api/users/{user}/posts/{}", created.post.id))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let response = client
        .get(format!("{base}/api/users/{user}/posts/{}", created.post.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let status: Stats = client
        .get(format!("{base}/api/users/{user}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.health, 100);
    assert_eq!(status.hunger, 10);
}

#[tokio::test]
async fn http_rejects_invalid_posts() {
    let server = shared_server().await;
    let client = Client::new();
    let user = fresh_user("invalid");

    let response = client
        .post(format!("{}/api/users/{user}/posts", server.base_url))
        .json(&json!({ "episode": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/api/users/{user}/posts", server.base_url))
        .json(&json!({ "episode": "ok", "date": "03/02/2026" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_status_adjust_is_clamped() {
    let server = shared_server().await;
    let client = Client::new();
    let user = fresh_user("adjust");

    let status: Stats = client
        .post(format!("{}/api/users/{user}/stats/hunger", server.base_url))
        .json(&json!({ "amount": -10 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.hunger, 0);

    let status: Stats = client
        .post(format!("{}/api/users/{user}/stats/hunger", server.base_url))
        .json(&json!({ "amount": -10 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.hunger, 0);

    let response = client
        .post(format!("{}/api/users/{user}/stats/money", server.base_url))
        .json(&json!({ "amount": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let status: Stats = client
        .post(format!("{}/api/users/{user}/status/reset", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.hunger, 10);
}

#[tokio::test]
async fn http_calendar_and_trends() {
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;
    let user = fresh_user("calendar");

    for time in ["08:00", "20:00"] {
        create_post(
            &client,
            base,
            &user,
            json!({ "episode": "entry", "date": "2025-02-14", "time": time }),
        )
        .await;
    }

    let calendar: Calendar = client
        .get(format!("{base}/api/users/{user}/calendar/2025-02"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(calendar.month, "2025-02");
    assert_eq!(calendar.days.len(), 28);
    let day = calendar
        .days
        .iter()
        .find(|day| day.date == "2025-02-14")
        .expect("missing day");
    assert_eq!(day.post_count, 2);

    let trends: Trends = client
        .get(format!("{base}/api/users/{user}/trends"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(trends.last_7_days.len(), 7);
    assert_eq!(trends.weekly_totals.len(), 8);
}

#[tokio::test]
async fn http_profile_rename() {
    let server = shared_server().await;
    let client = Client::new();
    let user = fresh_user("profile");

    let profile: Profile = client
        .put(format!("{}/api/users/{user}/profile", server.base_url))
        .json(&json!({ "user_name": "  Hana  " }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile.user_id, user);
    assert_eq!(profile.user_name, "Hana");
    assert_eq!(profile.post_count, 0);
}

#[tokio::test]
async fn http_ai_unavailable_without_key() {
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/analyze", server.base_url))
        .json(&json!({ "episode": "Had a great dinner with friends" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn http_form_post_redirects_and_renders() {
    let server = shared_server().await;
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = client
        .post(format!("{}/posts", server.base_url))
        .form(&[
            ("episode", "Baked <bread> today"),
            ("health", ""),
            ("happiness", "12"),
            ("mentalState", "-"),
            ("hunger", "20"),
        ])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());

    let html = client
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("Baked &lt;bread&gt; today"));
    assert!(html.contains("Happiness +12"));
}
