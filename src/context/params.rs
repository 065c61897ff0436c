//! Lenient typed access to request parameters and header values.
//!
//! None of these accessors fail: a missing key, an empty value, or a value
//! that does not parse all yield the type's zero value or the supplied
//! default. Handlers that need strict validation must check for those
//! values themselves.

use std::str::FromStr;

use super::RequestContext;

/// Header keys filled in by the gateway in front of the service.
pub mod header_keys {
    /// Client IP address.
    pub const IP: &str = "ip";
    /// Client language, for example `zh`, `en`, or `ko`.
    pub const LANG: &str = "lang";
    /// Client device description, for example `iphone 7 Plus`.
    pub const DEVICE: &str = "device";
    /// Device type: `N` for web, `a` for Android, `i` for iOS.
    pub const DT: &str = "dt";
    /// Host the request was addressed to.
    pub const HOST: &str = "host";
}

fn parse_or<T: FromStr>(raw: &str, default: T) -> T {
    if raw.is_empty() {
        return default;
    }
    raw.parse().unwrap_or(default)
}

impl RequestContext {
    /// Whether `key` is present in the request parameters.
    #[must_use]
    pub fn is_param_exist(&self, key: &str) -> bool { self.request.params.contains_key(key) }

    /// The parameter named `key`, falling back to the header value of the
    /// same name when the parameter is missing or empty.
    #[must_use]
    pub fn string_param(&self, key: &str) -> &str {
        match self.request.params.get(key) {
            Some(value) if !value.is_empty() => value,
            _ => self.string_header(key),
        }
    }

    /// Like [`string_param`](Self::string_param) but returns `default` when
    /// nothing non-empty was found.
    #[must_use]
    pub fn string_param_default<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.string_param(key) {
            "" => default,
            value => value,
        }
    }

    /// Parse the parameter named `key` as `T`, returning `T::default()` on
    /// absence or parse failure.
    #[must_use]
    pub fn param<T>(&self, key: &str) -> T
    where
        T: FromStr + Default,
    {
        parse_or(self.string_param(key), T::default())
    }

    /// Parse the parameter named `key` as `T`, returning `default` on absence
    /// or parse failure.
    #[must_use]
    pub fn param_or<T: FromStr>(&self, key: &str, default: T) -> T {
        parse_or(self.string_param(key), default)
    }

    /// The parameter named `key` as an `i32`, or `0`.
    #[must_use]
    pub fn int_param(&self, key: &str) -> i32 { self.param(key) }

    /// The parameter named `key` as an `i32`, or `default`.
    #[must_use]
    pub fn int_param_default(&self, key: &str, default: i32) -> i32 { self.param_or(key, default) }

    /// The parameter named `key` as an `i64`, or `0`.
    #[must_use]
    pub fn int64_param(&self, key: &str) -> i64 { self.param(key) }

    /// The parameter named `key` as an `i64`, or `default`.
    #[must_use]
    pub fn int64_param_default(&self, key: &str, default: i64) -> i64 {
        self.param_or(key, default)
    }

    /// The parameter named `key` as an `f64`, or `0.0`.
    #[must_use]
    pub fn float64_param(&self, key: &str) -> f64 { self.param(key) }

    /// The parameter named `key` as an `f64`, or `default`.
    #[must_use]
    pub fn float64_param_default(&self, key: &str, default: f64) -> f64 {
        self.param_or(key, default)
    }

    /// The header value named `key`, or `""`.
    ///
    /// See [`header_keys`](super::header_keys) for the keys set by gateways.
    #[must_use]
    pub fn string_header(&self, key: &str) -> &str {
        self.request
            .header
            .get(key)
            .map_or("", String::as_str)
    }

    /// The header value named `key`, or `default` when the key is absent.
    ///
    /// A key that is present with an empty value yields `""`, not `default`.
    #[must_use]
    pub fn string_header_default<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.request
            .header
            .get(key)
            .map_or(default, String::as_str)
    }

    /// The header value named `key` as an `i32`, or `0`.
    #[must_use]
    pub fn int_header(&self, key: &str) -> i32 { parse_or(self.string_header(key), 0) }

    /// The header value named `key` as an `i64`, or `0`.
    #[must_use]
    pub fn int64_header(&self, key: &str) -> i64 { parse_or(self.string_header(key), 0) }
}
