use std::cell::RefCell;
use std::time::{Duration, SystemTime};

use http::header::HeaderValue;

// "Sun, 06 Nov 1994 08:49:37 GMT".len()
pub(crate) const DATE_VALUE_LENGTH: usize = 29;

/// Returns the current `Date` header value, refreshing the cached
/// rendering at most once per second.
pub(crate) fn update_and_header_value() -> HeaderValue {
    CACHED.with(|cache| {
        let mut cache = cache.borrow_mut();
        cache.check();
        cache.value.clone()
    })
}

struct CachedDate {
    value: HeaderValue,
    next_update: SystemTime,
}

thread_local!(static CACHED: RefCell<CachedDate> = RefCell::new(CachedDate::new()));

impl CachedDate {
    fn new() -> Self {
        let mut cache = CachedDate {
            value: HeaderValue::from_static(""),
            next_update: SystemTime::UNIX_EPOCH,
        };
        cache.update(SystemTime::now());
        cache
    }

    fn check(&mut self) {
        let now = SystemTime::now();
        if now > self.next_update {
            self.update(now);
        }
    }

    fn update(&mut self, now: SystemTime) {
        let rendered = httpdate::fmt_http_date(now);
        debug_assert!(rendered.len() == DATE_VALUE_LENGTH);
        self.value = HeaderValue::from_str(&rendered)
            .expect("Date format should be valid HeaderValue");
        self.next_update = now + Duration::from_secs(1);
    }
}
