// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process model of what the edge does with a request before the handler
//! ever sees it. Used to check throttling, preflight and routing behavior
//! without a deployed endpoint.

use std::time::Duration;

use crate::edge::{CorsPolicy, HttpMethod};

pub const THROTTLED_STATUS: u16 = 429;
pub const MISSING_ROUTE_STATUS: u16 = 403;
pub const PREFLIGHT_STATUS: u16 = 204;

/// Steady-state rate with a burst ceiling. Starts full.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
	rate: f64,
	capacity: f64,
	tokens: f64,
	last: Duration,
}

impl TokenBucket {
	pub fn new(rate: f64, burst: u32) -> Self {
		let capacity = f64::from(burst);
		Self {
			rate,
			capacity,
			tokens: capacity,
			last: Duration::ZERO,
		}
	}

	fn refill(&mut self, now: Duration) {
		// A clock that goes backwards refills nothing.
		if let Some(elapsed) = now.checked_sub(self.last) {
			self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
			self.last = now;
		}
	}

	/// Take one token at `now` (offset from an arbitrary epoch).
	pub fn try_acquire(&mut self, now: Duration) -> bool {
		self.refill(now);
		if self.tokens >= 1.0 {
			self.tokens -= 1.0;
			true
		} else {
			false
		}
	}

	pub fn available(&self) -> f64 {
		self.tokens
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest {
	pub method: HttpMethod,
	/// Path relative to the stage, with a leading `/`.
	pub path: String,
	pub query: Option<String>,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

impl EdgeRequest {
	pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: None,
			headers: Vec::new(),
			body: Vec::new(),
		}
	}

	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();
		self
	}

	pub fn query(mut self, query: impl Into<String>) -> Self {
		self.query = Some(query.into());
		self
	}

	pub fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> + Clone {
		self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

/// A response produced by the edge itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResponse {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	pub body: String,
}

impl EdgeResponse {
	fn message(status: u16, message: &str) -> Self {
		Self {
			status,
			headers: vec![("Content-Type".to_string(), "application/json".to_string())],
			body: format!("{{\"message\":\"{message}\"}}"),
		}
	}

	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(k, _)| k.eq_ignore_ascii_case(name))
			.map(|(_, v)| v.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeOutcome {
	/// Handed to the handler exactly as received.
	Forwarded(EdgeRequest),
	Preflight(EdgeResponse),
	Throttled(EdgeResponse),
	MissingRoute(EdgeResponse),
}

impl EdgeOutcome {
	pub fn reaches_handler(&self) -> bool {
		matches!(self, EdgeOutcome::Forwarded(_))
	}

	pub fn status(&self) -> Option<u16> {
		match self {
			EdgeOutcome::Forwarded(_) => None,
			EdgeOutcome::Preflight(r) | EdgeOutcome::Throttled(r) | EdgeOutcome::MissingRoute(r) => {
				Some(r.status)
			}
		}
	}
}

/// Admission control for one stage: throttle first, then route.
#[derive(Debug, Clone)]
pub struct EdgeModel {
	route_path: String,
	cors: CorsPolicy,
	bucket: TokenBucket,
}

impl EdgeModel {
	pub fn new(path: &str, cors: CorsPolicy, rate: f64, burst: u32) -> Self {
		Self {
			route_path: format!("/{path}"),
			cors,
			bucket: TokenBucket::new(rate, burst),
		}
	}

	pub fn route_path(&self) -> &str {
		&self.route_path
	}

	pub fn admit(&mut self, request: EdgeRequest, now: Duration) -> EdgeOutcome {
		// Stage throttling covers every method, preflight included.
		if !self.bucket.try_acquire(now) {
			return EdgeOutcome::Throttled(EdgeResponse::message(
				THROTTLED_STATUS,
				"Too Many Requests",
			));
		}

		if request.path != self.route_path {
			return EdgeOutcome::MissingRoute(EdgeResponse::message(
				MISSING_ROUTE_STATUS,
				"Missing Authentication Token",
			));
		}

		match request.method {
			HttpMethod::Post => EdgeOutcome::Forwarded(request),
			HttpMethod::Options => EdgeOutcome::Preflight(EdgeResponse {
				status: PREFLIGHT_STATUS,
				headers: self
					.cors
					.response_headers()
					.into_iter()
					.map(|(k, v)| (k.to_string(), v))
					.collect(),
				body: String::new(),
			}),
			_ => EdgeOutcome::MissingRoute(EdgeResponse::message(
				MISSING_ROUTE_STATUS,
				"Missing Authentication Token",
			)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn model() -> EdgeModel {
		EdgeModel::new("slack", CorsPolicy::slack(), 10.0, 20)
	}

	#[test]
	fn test_bucket_starts_full() {
		let mut bucket = TokenBucket::new(10.0, 20);
		for _ in 0..20 {
			assert!(bucket.try_acquire(Duration::ZERO));
		}
		assert!(!bucket.try_acquire(Duration::ZERO));
	}

	#[test]
	fn test_bucket_refills_at_rate() {
		let mut bucket = TokenBucket::new(10.0, 20);
		for _ in 0..20 {
			bucket.try_acquire(Duration::ZERO);
		}
		let later = Duration::from_millis(500);
		let admitted = (0..10).filter(|_| bucket.try_acquire(later)).count();
		assert_eq!(admitted, 5);
	}

	#[test]
	fn test_bucket_caps_at_burst() {
		let mut bucket = TokenBucket::new(10.0, 20);
		bucket.try_acquire(Duration::from_secs(3600));
		assert_eq!(bucket.available(), 19.0);
	}

	#[test]
	fn test_clock_going_backwards() {
		let mut bucket = TokenBucket::new(1.0, 1);
		assert!(bucket.try_acquire(Duration::from_secs(10)));
		assert!(!bucket.try_acquire(Duration::from_secs(5)));
	}

	#[test]
	fn test_post_forwarded_unchanged() {
		let request = EdgeRequest::new(HttpMethod::Post, "/slack")
			.header("Content-Type", "application/x-www-form-urlencoded")
			.query("a=1")
			.body("token=x&text=hi");
		let outcome = model().admit(request.clone(), Duration::ZERO);
		assert_eq!(outcome, EdgeOutcome::Forwarded(request));
		assert!(outcome.reaches_handler());
	}

	#[test]
	fn test_preflight_does_not_reach_handler() {
		let outcome = model().admit(EdgeRequest::new(HttpMethod::Options, "/slack"), Duration::ZERO);
		let EdgeOutcome::Preflight(response) = outcome else {
			panic!("expected preflight, got {outcome:?}");
		};
		assert_eq!(response.status, 204);
		assert_eq!(response.header("Access-Control-Allow-Methods"), Some("POST"));
		assert_eq!(response.header("access-control-allow-origin"), Some("*"));
	}

	#[test]
	fn test_unknown_path_and_method() {
		let mut model = model();
		let outcome = model.admit(EdgeRequest::new(HttpMethod::Post, "/other"), Duration::ZERO);
		assert_eq!(outcome.status(), Some(403));
		let outcome = model.admit(EdgeRequest::new(HttpMethod::Get, "/slack"), Duration::ZERO);
		let EdgeOutcome::MissingRoute(response) = outcome else {
			panic!("expected missing route");
		};
		assert!(response.body.contains("Missing Authentication Token"));
	}

	#[test]
	fn test_throttle_checked_before_routing() {
		let mut model = EdgeModel::new("slack", CorsPolicy::slack(), 1.0, 1);
		model.admit(EdgeRequest::new(HttpMethod::Get, "/nowhere"), Duration::ZERO);
		let outcome = model.admit(EdgeRequest::new(HttpMethod::Post, "/slack"), Duration::ZERO);
		assert_eq!(outcome.status(), Some(429));
	}
}
