//! Implements the `Transport` trait with an in-memory imitation of the finance API.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without a server (see `Mode::Test`). Tests also use its knobs to make the
//! server revoke tokens or reject everything, and its counters to see what was sent.

use crate::api::{
    endpoint, HttpRequest, HttpResponse, Method, Transport, API_PREFIX, AUTHORIZATION, LOGIN,
    PASSWORD_CHANGE, PROFILE_UPDATE, REGISTER, TOKEN_REFRESH,
};
use crate::error::Res;
use chrono::{Datelike, Local, Months, NaiveDate};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The collections the fake serves, by URL segment.
const COLLECTIONS: &[&str] = &["ingresos", "gastos", "gastosfijos", "ahorros", "objetivo"];
const FREQUENCIES: &str = "frecuencia";

/// An in-memory finance API.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    /// username -> (password, profile)
    users: BTreeMap<String, (String, Value)>,
    /// token -> username
    access_tokens: BTreeMap<String, String>,
    refresh_tokens: BTreeMap<String, String>,
    next_token: u64,
    next_id: u64,
    collections: BTreeMap<String, Vec<Value>>,
    frequencies: Vec<Value>,
    /// Answer every authenticated request with 401, even with a fresh token.
    reject_all: bool,
    /// Canned responses by endpoint path, checked before routing.
    overrides: BTreeMap<String, HttpResponse>,
    refresh_calls: usize,
    requests: Vec<HttpRequest>,
}

impl FakeApi {
    /// An API with no users and no data.
    pub fn new() -> Self {
        let api = Self::default();
        {
            let mut state = api.state();
            for name in COLLECTIONS {
                state.collections.insert(name.to_string(), Vec::new());
            }
            state.frequencies = ["Semanal", "Mensual", "Trimestral", "Anual"]
                .iter()
                .enumerate()
                .map(|(i, label)| json!({ "id": i + 1, "nombre": label }))
                .collect();
        }
        api
    }

    /// An API with a `demo` user (password `demo`) and a few months of data ending today.
    pub fn seeded() -> Self {
        let api = Self::new();
        api.add_user("demo", "demo");
        let today = Local::now().date_naive();
        let month_start = |back: u32| {
            NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
                .and_then(|d| d.checked_sub_months(Months::new(back)))
                .unwrap_or(today)
        };
        for back in 0..4 {
            let first = month_start(back);
            api.insert(
                "ingresos",
                json!({"amount": "2100.00", "date": first, "description": "Nómina"}),
            );
            api.insert(
                "gastos",
                json!({"amount": "320.45", "date": first, "description": "Supermercado Día"}),
            );
            api.insert(
                "gastos",
                json!({"amount": "41.20", "date": first, "description": "Factura luz"}),
            );
        }
        api.insert(
            "gastos",
            json!({"amount": "64.00", "date": month_start(1), "description": "Cine y cena"}),
        );
        api.insert(
            "gastosfijos",
            json!({"amount": "750.00", "description": "Alquiler piso", "frequency": 2}),
        );
        api.insert(
            "gastosfijos",
            json!({"amount": "12.99", "description": "Netflix", "frequency": 2}),
        );
        api.insert(
            "ahorros",
            json!({
                "name": "Fondo de emergencia",
                "amount": "1500.00",
                "start_date": month_start(3),
                "end_date": month_start(3).checked_add_months(Months::new(12)),
                "description": "Tres meses de gastos"
            }),
        );
        api.insert(
            "objetivo",
            json!({
                "name": "Vacaciones",
                "description": "Vacaciones",
                "target_amount": "1200.00",
                "current_amount": "450.00",
                "frequency": 2
            }),
        );
        api
    }

    pub fn add_user(&self, username: &str, password: &str) {
        self.state().users.insert(
            username.to_string(),
            (password.to_string(), json!({ "username": username })),
        );
    }

    /// Adds a record to a collection, assigning it an id. Returns the id.
    pub fn insert(&self, collection: &str, mut record: Value) -> u64 {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        if let Some(object) = record.as_object_mut() {
            object.insert("id".into(), json!(id));
        }
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record);
        id
    }

    /// The records currently held in `collection`.
    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.state()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Issues an access and refresh token for `username` as a login would.
    pub fn issue_tokens(&self, username: &str) -> (String, String) {
        let mut state = self.state();
        let access = state.new_token("access");
        let refresh = state.new_token("refresh");
        state
            .access_tokens
            .insert(access.clone(), username.to_string());
        state
            .refresh_tokens
            .insert(refresh.clone(), username.to_string());
        (access, refresh)
    }

    /// Honors tokens issued by another instance, e.g. the session a previous process saved. They
    /// are ignored when `username` is not a user of this API.
    pub fn accept_tokens(&self, access: Option<&str>, refresh: Option<&str>, username: &str) {
        let mut state = self.state();
        if !state.users.contains_key(username) {
            return;
        }
        for token in access.iter().chain(refresh.iter()) {
            state.skip_token(token);
        }
        if let Some(access) = access {
            state
                .access_tokens
                .insert(access.to_string(), username.to_string());
        }
        if let Some(refresh) = refresh {
            state
                .refresh_tokens
                .insert(refresh.to_string(), username.to_string());
        }
    }

    /// Forget every access token, as if they had all expired.
    pub fn revoke_access_tokens(&self) {
        self.state().access_tokens.clear();
    }

    /// Forget every refresh token.
    pub fn revoke_refresh_tokens(&self) {
        self.state().refresh_tokens.clear();
    }

    pub fn reject_all_authenticated(&self, reject: bool) {
        self.state().reject_all = reject;
    }

    /// Answer any request to `path` (e.g. `"ingresos"`) with `status` and `body`.
    pub fn override_response(&self, path: &str, status: u16, body: &str) {
        self.state()
            .overrides
            .insert(endpoint(path), HttpResponse::new(status, body));
    }

    pub fn refresh_calls(&self) -> usize {
        self.state().refresh_calls
    }

    pub fn total_requests(&self) -> usize {
        self.state().requests.len()
    }

    /// How many requests were sent to exactly `path`, e.g. `"api/finanzas/ingresos/"`.
    pub fn requests_to(&self, path: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.state().requests.last().cloned()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, request: HttpRequest) -> HttpResponse {
        let mut state = self.state();
        state.requests.push(request.clone());

        let path = request.path.trim_start_matches('/').to_string();
        let route = path
            .strip_prefix(API_PREFIX)
            .unwrap_or(&path)
            .trim_matches('/')
            .to_string();
        let body = request
            .body
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose();
        let Ok(body) = body else {
            return detail(400, "JSON parse error");
        };

        // Unauthenticated endpoints
        if route == TOKEN_REFRESH {
            state.refresh_calls += 1;
        }
        if let Some(canned) = state.overrides.get(&path) {
            return canned.clone();
        }
        match (request.method, route.as_str()) {
            (Method::Post, LOGIN) => return state.login(body),
            (Method::Post, REGISTER) => return state.register(body),
            (Method::Post, TOKEN_REFRESH) => return state.refresh(body),
            _ => {}
        }

        // Everything else needs a valid bearer token
        let token = request
            .header(AUTHORIZATION)
            .and_then(|h| h.strip_prefix("Bearer "))
            .unwrap_or_default();
        let username = match state.access_tokens.get(token) {
            Some(username) if !state.reject_all => username.clone(),
            _ => return detail(401, "Given token not valid for any token type"),
        };

        let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
        match (request.method, route.as_str()) {
            (Method::Put, PROFILE_UPDATE) => return state.update_profile(&username, body),
            (Method::Post, PASSWORD_CHANGE) => return state.change_password(&username, body),
            (Method::Get, FREQUENCIES) => {
                return HttpResponse::new(200, Value::from(state.frequencies.clone()).to_string())
            }
            _ => {}
        }
        match (request.method, segments.as_slice()) {
            (Method::Get, [collection]) => match state.collections.get(*collection) {
                Some(records) => HttpResponse::new(200, Value::from(records.clone()).to_string()),
                None => detail(404, "Not found."),
            },
            (Method::Post, [collection]) => state.create(collection, body),
            (method, [collection, id]) => match id.parse::<u64>() {
                Ok(id) => state.item(method, collection, id, body),
                Err(_) => detail(404, "Not found."),
            },
            _ => detail(404, "Not found."),
        }
    }
}

impl State {
    fn new_token(&mut self, kind: &str) -> String {
        self.next_token += 1;
        format!("{kind}-{}", self.next_token)
    }

    /// Makes sure `new_token` never hands out `token` again.
    fn skip_token(&mut self, token: &str) {
        let issued = token
            .rsplit_once('-')
            .and_then(|(_, n)| n.parse::<u64>().ok())
            .unwrap_or_default();
        self.next_token = self.next_token.max(issued);
    }

    fn login(&mut self, body: Option<Value>) -> HttpResponse {
        let body = body.unwrap_or_default();
        let username = str_field(&body, "username");
        let password = str_field(&body, "password");
        let profile = match self.users.get(username) {
            Some((stored, profile)) if stored == password => profile.clone(),
            _ => return detail(401, "No active account found with the given credentials"),
        };
        let (access, refresh) = self.session_for(username);
        let response = json!({ "access": access, "refresh": refresh, "user": profile });
        HttpResponse::new(200, response.to_string())
    }

    fn register(&mut self, body: Option<Value>) -> HttpResponse {
        let body = body.unwrap_or_default();
        let username = str_field(&body, "username").to_string();
        let password = str_field(&body, "password").to_string();
        if username.is_empty() || password.is_empty() {
            return detail(400, "Username and password are required");
        }
        if self.users.contains_key(&username) {
            return HttpResponse::new(
                400,
                json!({ "error": "A user with that username already exists." }).to_string(),
            );
        }
        let mut profile = json!({ "username": username });
        if let Some(email) = body.get("email") {
            profile["email"] = email.clone();
        }
        self.users
            .insert(username.clone(), (password, profile.clone()));
        let (access, refresh) = self.session_for(&username);
        let response = json!({ "access": access, "refresh": refresh, "user": profile });
        HttpResponse::new(201, response.to_string())
    }

    fn session_for(&mut self, username: &str) -> (String, String) {
        let access = self.new_token("access");
        let refresh = self.new_token("refresh");
        self.access_tokens
            .insert(access.clone(), username.to_string());
        self.refresh_tokens
            .insert(refresh.clone(), username.to_string());
        (access, refresh)
    }

    fn refresh(&mut self, body: Option<Value>) -> HttpResponse {
        let body = body.unwrap_or_default();
        let Some(username) = self
            .refresh_tokens
            .get(str_field(&body, "refresh"))
            .cloned()
        else {
            return detail(401, "Token is invalid or expired");
        };
        let access = self.new_token("access");
        self.access_tokens.insert(access.clone(), username);
        HttpResponse::new(200, json!({ "access": access }).to_string())
    }

    fn update_profile(&mut self, username: &str, body: Option<Value>) -> HttpResponse {
        let Some(Value::Object(changes)) = body else {
            return detail(400, "Invalid data");
        };
        let Some((password, mut profile)) = self.users.remove(username) else {
            return detail(404, "Not found.");
        };
        merge(&mut profile, changes);
        let new_name = str_field(&profile, "username").to_string();
        if new_name != username {
            for owner in self
                .access_tokens
                .values_mut()
                .chain(self.refresh_tokens.values_mut())
            {
                if owner == username {
                    *owner = new_name.clone();
                }
            }
        }
        self.users.insert(new_name, (password, profile.clone()));
        HttpResponse::new(200, profile.to_string())
    }

    fn change_password(&mut self, username: &str, body: Option<Value>) -> HttpResponse {
        let body = body.unwrap_or_default();
        let Some((password, _)) = self.users.get_mut(username) else {
            return detail(404, "Not found.");
        };
        if str_field(&body, "old_password") != password.as_str() {
            return detail(400, "Wrong password.");
        }
        *password = str_field(&body, "new_password").to_string();
        detail(200, "Password updated successfully")
    }

    fn create(&mut self, collection: &str, body: Option<Value>) -> HttpResponse {
        let Some(mut record @ Value::Object(_)) = body else {
            return detail(400, "Invalid data");
        };
        self.next_id += 1;
        record["id"] = json!(self.next_id);
        match self.collections.get_mut(collection) {
            Some(records) => {
                records.push(record.clone());
                HttpResponse::new(201, record.to_string())
            }
            None => detail(404, "Not found."),
        }
    }

    fn item(&mut self, method: Method, collection: &str, id: u64, body: Option<Value>) -> HttpResponse {
        let Some(records) = self.collections.get_mut(collection) else {
            return detail(404, "Not found.");
        };
        let Some(position) = records.iter().position(|r| r["id"] == json!(id)) else {
            return detail(404, "Not found.");
        };
        match method {
            Method::Get => HttpResponse::new(200, records[position].to_string()),
            Method::Put => {
                let Some(mut record @ Value::Object(_)) = body else {
                    return detail(400, "Invalid data");
                };
                record["id"] = json!(id);
                records[position] = record.clone();
                HttpResponse::new(200, record.to_string())
            }
            Method::Patch => {
                let Some(Value::Object(changes)) = body else {
                    return detail(400, "Invalid data");
                };
                merge(&mut records[position], changes);
                HttpResponse::new(200, records[position].to_string())
            }
            Method::Delete => {
                records.remove(position);
                HttpResponse::new(204, "")
            }
            Method::Post => detail(405, "Method not allowed."),
        }
    }
}

#[async_trait::async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: HttpRequest) -> Res<HttpResponse> {
        Ok(self.handle(request))
    }
}

fn detail(status: u16, message: &str) -> HttpResponse {
    HttpResponse::new(status, json!({ "detail": message }).to_string())
}

fn str_field<'a>(value: &'a Value, name: &str) -> &'a str {
    value.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn merge(target: &mut Value, changes: Map<String, Value>) {
    if let Value::Object(object) = target {
        object.extend(changes);
    }
}
