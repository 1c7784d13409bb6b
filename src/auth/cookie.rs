//! Session cookie binding.
//!
//! The HTTP layer hands in its request [`CookieJar`] and returns the updated
//! jar with the response; this module decides what the cookie looks like.
//! The cookie is `name=token; HttpOnly; SameSite=Lax; Path=/`, and clearing
//! sends the same name with `Max-Age=0`.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Cookie naming and attributes.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Cookie name.
    pub name: String,
    /// Whether to set the `Secure` attribute.
    pub secure: bool,
}

impl CookieSettings {
    /// Create settings for a cookie called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secure: false,
        }
    }

    /// Set the `Secure` attribute.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Build the cookie carrying `token`.
    pub fn session_cookie(&self, token: &str) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), token.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        if self.secure {
            builder = builder.secure(true);
        }
        builder.build()
    }

    /// Build a cookie that makes the browser drop the session immediately.
    pub fn clearing_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.session_cookie("");
        cookie.make_removal();
        cookie
    }

    /// Extract the raw session token from a request jar.
    pub fn token_from_jar(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Attach a session token to the response jar.
    pub fn attach(&self, jar: CookieJar, token: &str) -> CookieJar {
        jar.add(self.session_cookie(token))
    }

    /// Attach a clearing cookie to the response jar.
    pub fn detach(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.clearing_cookie())
    }
}
