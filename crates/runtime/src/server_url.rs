//! Server URL normalization.
//!
//! Users configure the server the way they see it in a browser
//! (`https://chat.example.com`, `chat.example.com`). The realtime endpoint is
//! the `/websocket` path of the same host over `ws`/`wss`.

use url::Url;

use crate::error::{Error, Result};

const WEBSOCKET_PATH: &str = "websocket";

/// Turns a user-facing server address into the WebSocket endpoint URL.
///
/// - `https://` becomes `wss://`, `http://` becomes `ws://`
/// - `ws://` and `wss://` are kept
/// - no scheme defaults to `wss://`
/// - `/websocket` is appended unless the path already ends with it
pub fn websocket_url(raw: &str) -> Result<Url> {
	let trimmed = raw.trim();
	if trimmed.is_empty() {
		return Err(Error::EmptyServerUrl);
	}

	let (scheme, rest) = match trimmed.split_once("://") {
		Some(("https", rest)) => ("wss", rest),
		Some(("http", rest)) => ("ws", rest),
		Some(("wss", rest)) => ("wss", rest),
		Some(("ws", rest)) => ("ws", rest),
		Some((other, _)) => {
			return Err(Error::InvalidUrl {
				url: raw.to_string(),
				reason: format!("unsupported scheme '{other}'"),
			});
		}
		None => ("wss", trimmed),
	};

	let rest = rest.trim_end_matches('/');
	if rest.is_empty() {
		return Err(Error::InvalidUrl {
			url: raw.to_string(),
			reason: "missing host".to_string(),
		});
	}

	let candidate = if rest.ends_with(&format!("/{WEBSOCKET_PATH}")) {
		format!("{scheme}://{rest}")
	} else {
		format!("{scheme}://{rest}/{WEBSOCKET_PATH}")
	};

	let url = Url::parse(&candidate).map_err(|e| Error::InvalidUrl {
		url: raw.to_string(),
		reason: e.to_string(),
	})?;

	if url.host_str().is_none_or(str::is_empty) {
		return Err(Error::InvalidUrl {
			url: raw.to_string(),
			reason: "missing host".to_string(),
		});
	}

	Ok(url)
}
