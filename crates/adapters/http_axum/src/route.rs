//! Route table — maps a verb and the path below the base path onto an
//! [`Endpoint`].
//!
//! Class tokens are not checked here; they are resolved against the
//! request's catalog once the endpoint is known.

use axum::http::Method;

use fog_domain::id::RecordId;

/// A matched API operation with its path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint<'a> {
    Status,
    Active { class: &'a str },
    Search { class: &'a str, item: String },
    List { class: &'a str },
    Get { class: &'a str, id: RecordId },
    Update { class: &'a str, id: RecordId },
    Task { class: &'a str, id: RecordId },
    Create { class: &'a str },
    Cancel { class: &'a str, id: Option<RecordId> },
    Delete { class: &'a str, id: RecordId },
}

/// Match `path` (relative to the base path) for `method`.
///
/// Returns `None` when nothing matches, including ids that are not
/// positive integers.
#[must_use]
pub fn resolve<'a>(method: &Method, path: &'a str) -> Option<Endpoint<'a>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if (*method == Method::HEAD || *method == Method::GET)
        && let ["system", "status" | "info"] = segments.as_slice()
    {
        return Some(Endpoint::Status);
    }

    match (method.as_str(), segments.as_slice()) {
        ("GET", [class, "current" | "active"]) => Some(Endpoint::Active { class: *class }),
        ("GET", [class, "search", item @ ..]) if !item.is_empty() => Some(Endpoint::Search {
            class: *class,
            item: item.join("/"),
        }),
        ("GET", [class] | [class, "list" | "all"]) => Some(Endpoint::List { class: *class }),
        ("GET", [class, raw]) => parse_id(raw).map(|id| Endpoint::Get { class: *class, id }),
        ("PUT", [class, raw] | [class, raw, "update" | "edit"]) => {
            parse_id(raw).map(|id| Endpoint::Update { class: *class, id })
        }
        ("POST", [class, raw, "task"]) => parse_id(raw).map(|id| Endpoint::Task { class: *class, id }),
        ("POST", [class] | [class, "create" | "new"]) => Some(Endpoint::Create { class: *class }),
        ("DELETE", [class, "cancel"]) => Some(Endpoint::Cancel {
            class: *class,
            id: None,
        }),
        ("DELETE", [class, raw, "cancel"]) => parse_id(raw).map(|id| Endpoint::Cancel {
            class: *class,
            id: Some(id),
        }),
        ("DELETE", [class, raw] | [class, raw, "delete" | "remove"]) => {
            parse_id(raw).map(|id| Endpoint::Delete { class: *class, id })
        }
        _ => None,
    }
}

fn parse_id(raw: &str) -> Option<RecordId> {
    raw.parse::<i64>().ok().and_then(RecordId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: i64) -> RecordId {
        RecordId::new(raw).unwrap()
    }

    #[test]
    fn should_match_status_for_head_and_get() {
        assert_eq!(resolve(&Method::GET, "/system/status"), Some(Endpoint::Status));
        assert_eq!(resolve(&Method::HEAD, "/system/info"), Some(Endpoint::Status));
        assert_eq!(resolve(&Method::POST, "/system/status"), None);
    }

    #[test]
    fn should_match_list_variants() {
        for path in ["/host", "/host/", "/host/list", "/host/all"] {
            assert_eq!(resolve(&Method::GET, path), Some(Endpoint::List { class: "host" }), "{path}");
        }
    }

    #[test]
    fn should_match_active_before_get() {
        assert_eq!(resolve(&Method::GET, "/task/active"), Some(Endpoint::Active { class: "task" }));
        assert_eq!(resolve(&Method::GET, "/task/current"), Some(Endpoint::Active { class: "task" }));
    }

    #[test]
    fn should_keep_slashes_in_search_item() {
        assert_eq!(
            resolve(&Method::GET, "/image/search/win/10"),
            Some(Endpoint::Search {
                class: "image",
                item: "win/10".to_string()
            })
        );
        assert_eq!(resolve(&Method::GET, "/image/search"), None);
    }

    #[test]
    fn should_require_integer_ids() {
        assert_eq!(resolve(&Method::GET, "/host/12"), Some(Endpoint::Get { class: "host", id: id(12) }));
        assert_eq!(resolve(&Method::GET, "/host/abc"), None);
        assert_eq!(resolve(&Method::GET, "/host/0"), None);
        assert_eq!(resolve(&Method::DELETE, "/host/x/delete"), None);
    }

    #[test]
    fn should_match_update_variants() {
        for path in ["/host/3", "/host/3/update", "/host/3/edit"] {
            assert_eq!(
                resolve(&Method::PUT, path),
                Some(Endpoint::Update { class: "host", id: id(3) }),
                "{path}"
            );
        }
    }

    #[test]
    fn should_match_create_and_task() {
        assert_eq!(resolve(&Method::POST, "/host/new"), Some(Endpoint::Create { class: "host" }));
        assert_eq!(resolve(&Method::POST, "/host/create"), Some(Endpoint::Create { class: "host" }));
        assert_eq!(
            resolve(&Method::POST, "/group/5/task"),
            Some(Endpoint::Task { class: "group", id: id(5) })
        );
    }

    #[test]
    fn should_match_cancel_before_delete() {
        assert_eq!(
            resolve(&Method::DELETE, "/task/cancel"),
            Some(Endpoint::Cancel { class: "task", id: None })
        );
        assert_eq!(
            resolve(&Method::DELETE, "/host/2/cancel"),
            Some(Endpoint::Cancel { class: "host", id: Some(id(2)) })
        );
        assert_eq!(
            resolve(&Method::DELETE, "/host/2/remove"),
            Some(Endpoint::Delete { class: "host", id: id(2) })
        );
    }

    #[test]
    fn should_reject_unknown_verbs_and_shapes() {
        assert_eq!(resolve(&Method::PATCH, "/host/2"), None);
        assert_eq!(resolve(&Method::GET, "/host/2/extra"), None);
        assert_eq!(resolve(&Method::GET, "/"), None);
    }
}
