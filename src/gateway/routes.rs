//! Route descriptors and the site's route table
//!
//! A [`RouteDescriptor`] is the only thing that differs between endpoints;
//! the gateway runs the same state machine for all of them.

use hyper::StatusCode;

use super::fallback::{FallbackCatalog, FallbackRef, NotFoundMessage};
use super::transform::{self, Transform};
use super::validate::{AttachmentRule, SubmitRules, MAX_ATTACHMENT_BYTES};
use crate::error::FallbackLoadError;

/// How the inbound path is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundPath {
    /// Whole path must match
    Exact(&'static str),
    /// `prefix` followed by a single key segment, e.g. `/api/blogs/` + slug
    Keyed { prefix: &'static str, param: &'static str },
}

impl InboundPath {
    /// `None` when the path is not for this route; `Some(None)` for exact
    /// routes; `Some(Some(key))` (possibly empty) for keyed ones
    pub fn capture<'a>(&self, path: &'a str) -> Option<Option<&'a str>> {
        match *self {
            Self::Exact(exact) => (path == exact).then_some(None),
            Self::Keyed { prefix, .. } => {
                let key = path.strip_prefix(prefix)?;
                if key.contains('/') {
                    return None;
                }
                Some(Some(key))
            }
        }
    }

    /// Name of the captured key, for keyed routes
    pub const fn key_param(&self) -> Option<&'static str> {
        match *self {
            Self::Exact(_) => None,
            Self::Keyed { param, .. } => Some(param),
        }
    }

    /// The prefix without its trailing slash also reaches a keyed route, so
    /// that a missing key is answered with a validation error
    pub fn matches_bare_prefix(&self, path: &str) -> bool {
        match *self {
            Self::Exact(_) => false,
            Self::Keyed { prefix, .. } => prefix.strip_suffix('/') == Some(path),
        }
    }
}

/// Pagination query forwarded to upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

/// What a write route accepts and answers
#[derive(Debug, Clone, Copy)]
pub struct SubmitRoute {
    pub rules: SubmitRules,
    pub success_message: &'static str,
    pub failure_message: &'static str,
}

/// Read or write route
#[derive(Debug, Clone, Copy)]
pub enum RouteKind {
    Read,
    Submit(SubmitRoute),
}

/// One logical resource endpoint
#[derive(Debug, Clone, Copy)]
pub struct RouteDescriptor {
    pub name: &'static str,
    pub inbound: InboundPath,
    /// Upstream path segments; keyed routes append the key as one more segment
    pub upstream: &'static [&'static str],
    pub pagination: Option<Pagination>,
    /// Fixed query pairs sent on every call
    pub extra_query: &'static [(&'static str, &'static str)],
    pub transform: Transform,
    pub fallback: FallbackRef,
    pub kind: RouteKind,
    pub success_status: StatusCode,
}

impl RouteDescriptor {
    pub const fn is_submit(&self) -> bool {
        matches!(self.kind, RouteKind::Submit(_))
    }

    /// Method the route answers besides `OPTIONS`
    pub const fn method(&self) -> &'static str {
        if self.is_submit() {
            "POST"
        } else {
            "GET"
        }
    }

    /// `Allow` header value; read routes also answer `HEAD`
    pub const fn allow(&self) -> &'static str {
        if self.is_submit() {
            "POST, OPTIONS"
        } else {
            "GET, HEAD, OPTIONS"
        }
    }

    pub fn accepts(&self, method: &hyper::Method) -> bool {
        method.as_str() == self.method() || (*method == hyper::Method::HEAD && !self.is_submit())
    }

    /// Upstream segments for this request, key appended when the route is keyed
    pub fn upstream_segments(&self, key: Option<&str>) -> Vec<String> {
        let mut segments: Vec<String> = self.upstream.iter().map(ToString::to_string).collect();
        if let Some(key) = key {
            segments.push(key.to_string());
        }
        segments
    }

    /// Pagination (inbound value or default) followed by the fixed pairs
    pub fn upstream_query<'a, F>(&self, lookup: F) -> Vec<(String, String)>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut query = Vec::new();
        if let Some(pagination) = self.pagination {
            let page = lookup("page").map_or_else(|| pagination.page.to_string(), ToString::to_string);
            let limit =
                lookup("limit").map_or_else(|| pagination.limit.to_string(), ToString::to_string);
            query.push(("page".to_string(), page));
            query.push(("limit".to_string(), limit));
        }
        for (name, value) in self.extra_query {
            query.push(((*name).to_string(), (*value).to_string()));
        }
        query
    }
}

const APPLICATION_FIELDS: SubmitRules = SubmitRules {
    text_fields: &["name", "email", "phone", "applicationMotivation", "vacancyId"],
    attachment: AttachmentRule {
        field: "cv",
        content_type: "application/pdf",
        max_bytes: MAX_ATTACHMENT_BYTES,
    },
};

/// The site's endpoints
pub fn site_routes() -> Vec<RouteDescriptor> {
    vec![
        RouteDescriptor {
            name: "blogs",
            inbound: InboundPath::Exact("/api/blogs.json"),
            upstream: &["api", "blogs"],
            pagination: Some(Pagination { page: 1, limit: 4 }),
            extra_query: &[],
            transform: Transform::Passthrough,
            fallback: FallbackRef::Collection("blogs"),
            kind: RouteKind::Read,
            success_status: StatusCode::OK,
        },
        RouteDescriptor {
            name: "engineers",
            inbound: InboundPath::Exact("/api/engineers.json"),
            upstream: &["api", "users"],
            pagination: Some(Pagination { page: 1, limit: 10 }),
            extra_query: &[("isActive", "true")],
            transform: Transform::Projection(transform::page_items),
            fallback: FallbackRef::Collection("engineers"),
            kind: RouteKind::Read,
            success_status: StatusCode::OK,
        },
        RouteDescriptor {
            name: "team",
            inbound: InboundPath::Exact("/api/team.json"),
            upstream: &["api", "users"],
            pagination: Some(Pagination { page: 1, limit: 4 }),
            extra_query: &[("isActive", "true")],
            transform: Transform::Projection(transform::team_members),
            fallback: FallbackRef::Collection("team"),
            kind: RouteKind::Read,
            success_status: StatusCode::OK,
        },
        RouteDescriptor {
            name: "solutions",
            inbound: InboundPath::Exact("/api/solutions.json"),
            upstream: &["api", "solutions"],
            pagination: None,
            extra_query: &[],
            transform: Transform::Flatten(transform::solution_cards),
            fallback: FallbackRef::Collection("solutions"),
            kind: RouteKind::Read,
            success_status: StatusCode::OK,
        },
        RouteDescriptor {
            name: "vacancies",
            inbound: InboundPath::Exact("/api/vacancies.json"),
            upstream: &["api", "vacancies"],
            pagination: Some(Pagination { page: 1, limit: 4 }),
            extra_query: &[],
            transform: Transform::Projection(transform::vacancy_cards),
            fallback: FallbackRef::Collection("vacancies"),
            kind: RouteKind::Read,
            success_status: StatusCode::OK,
        },
        RouteDescriptor {
            name: "blog",
            inbound: InboundPath::Keyed { prefix: "/api/blogs/", param: "slug" },
            upstream: &["api", "blogs", "slug"],
            pagination: None,
            extra_query: &[],
            transform: Transform::Passthrough,
            fallback: FallbackRef::Keyed {
                table: "blog",
                not_found: NotFoundMessage("No se pudo encontrar el artículo con slug: {key}"),
            },
            kind: RouteKind::Read,
            success_status: StatusCode::OK,
        },
        RouteDescriptor {
            name: "user",
            inbound: InboundPath::Keyed { prefix: "/api/users/", param: "slug" },
            upstream: &["api", "users", "slug"],
            pagination: None,
            extra_query: &[],
            transform: Transform::Passthrough,
            fallback: FallbackRef::Keyed {
                table: "user",
                not_found: NotFoundMessage("Usuario no encontrado"),
            },
            kind: RouteKind::Read,
            success_status: StatusCode::OK,
        },
        RouteDescriptor {
            name: "vacancy",
            inbound: InboundPath::Keyed { prefix: "/api/vacancy/", param: "slug" },
            upstream: &["api", "vacancies", "slug"],
            pagination: None,
            extra_query: &[],
            transform: Transform::Passthrough,
            fallback: FallbackRef::Keyed {
                table: "vacancy",
                not_found: NotFoundMessage("Vacante no encontrada"),
            },
            kind: RouteKind::Read,
            success_status: StatusCode::OK,
        },
        RouteDescriptor {
            name: "applications",
            inbound: InboundPath::Exact("/api/applications"),
            upstream: &["api", "applications"],
            pagination: None,
            extra_query: &[],
            transform: Transform::Passthrough,
            fallback: FallbackRef::Absent,
            kind: RouteKind::Submit(SubmitRoute {
                rules: APPLICATION_FIELDS,
                success_message: "Aplicación recibida con éxito",
                failure_message: "Error al procesar la aplicación",
            }),
            success_status: StatusCode::CREATED,
        },
    ]
}

/// Every read route needs a fallback, and every collection it names must
/// exist in the catalog. Keyed tables may be missing (treated as empty).
pub fn check_catalog(
    routes: &[RouteDescriptor],
    catalog: &FallbackCatalog,
) -> Result<(), FallbackLoadError> {
    for route in routes {
        match (route.kind, route.fallback) {
            (RouteKind::Read, FallbackRef::Absent) => {
                return Err(FallbackLoadError::NoFallback {
                    route: route.name.to_string(),
                });
            }
            (_, FallbackRef::Collection(name)) if !catalog.has_collection(name) => {
                return Err(FallbackLoadError::MissingCollection {
                    route: route.name.to_string(),
                    name: name.to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Route for a path, plus the captured key for keyed routes
pub fn find_route<'r, 'p>(
    routes: &'r [RouteDescriptor],
    path: &'p str,
) -> Option<(&'r RouteDescriptor, Option<&'p str>)> {
    routes.iter().find_map(|route| {
        if let Some(key) = route.inbound.capture(path) {
            return Some((route, key));
        }
        route
            .inbound
            .matches_bare_prefix(path)
            .then_some((route, Some("")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_and_keyed_paths_resolve() {
        let routes = site_routes();

        let (route, key) = find_route(&routes, "/api/team.json").unwrap();
        assert_eq!(route.name, "team");
        assert_eq!(key, None);

        let (route, key) = find_route(&routes, "/api/vacancy/senior-frontend-developer").unwrap();
        assert_eq!(route.name, "vacancy");
        assert_eq!(key, Some("senior-frontend-developer"));

        assert!(find_route(&routes, "/api/vacancy/a/b").is_none());
        assert!(find_route(&routes, "/api/unknown.json").is_none());
    }

    #[test]
    fn missing_key_still_reaches_keyed_route() {
        let routes = site_routes();
        let (route, key) = find_route(&routes, "/api/blogs/").unwrap();
        assert_eq!(route.name, "blog");
        assert_eq!(key, Some(""));

        let (route, key) = find_route(&routes, "/api/users").unwrap();
        assert_eq!(route.name, "user");
        assert_eq!(key, Some(""));
    }

    #[test]
    fn query_defaults_and_overrides() {
        let routes = site_routes();
        let (engineers, _) = find_route(&routes, "/api/engineers.json").unwrap();

        assert_eq!(
            engineers.upstream_query(|_| None),
            vec![
                ("page".to_string(), "1".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("isActive".to_string(), "true".to_string()),
            ]
        );

        let overridden = engineers.upstream_query(|name| (name == "page").then_some("3"));
        assert_eq!(overridden[0], ("page".to_string(), "3".to_string()));
        assert_eq!(overridden[1], ("limit".to_string(), "10".to_string()));

        let (solutions, _) = find_route(&routes, "/api/solutions.json").unwrap();
        assert!(solutions.upstream_query(|_| Some("9")).is_empty());
    }

    #[test]
    fn keyed_segments_append_key() {
        let routes = site_routes();
        let (blog, _) = find_route(&routes, "/api/blogs/hola").unwrap();
        assert_eq!(blog.upstream_segments(Some("hola")), vec!["api", "blogs", "slug", "hola"]);
    }

    #[test]
    fn only_applications_is_a_submit_route() {
        let submits: Vec<_> = site_routes().into_iter().filter(RouteDescriptor::is_submit).collect();
        assert_eq!(submits.len(), 1);
        assert_eq!(submits[0].success_status, StatusCode::CREATED);
        assert_eq!(submits[0].method(), "POST");
    }

    #[test]
    fn catalog_check_fails_fast_on_missing_collection() {
        let routes = site_routes();
        assert!(check_catalog(&routes, &FallbackCatalog::bundled().unwrap()).is_ok());

        let partial = FallbackCatalog::default().with_collection("blogs", json!([]));
        let err = check_catalog(&routes, &partial).unwrap_err();
        assert!(err.to_string().contains("engineers"));
    }

    #[test]
    fn read_route_without_fallback_is_rejected() {
        let mut routes = site_routes();
        routes[0].fallback = FallbackRef::Absent;
        let err = check_catalog(&routes, &FallbackCatalog::bundled().unwrap()).unwrap_err();
        assert!(matches!(err, FallbackLoadError::NoFallback { .. }));
    }
}
