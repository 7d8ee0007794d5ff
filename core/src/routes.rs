//! Static route table for the admin front end.
//!
//! Paths resolve to page identifiers; anything unmatched falls through to
//! the not-found page. Matching ignores the query string, the fragment, a
//! trailing slash and ASCII case.

/// Pages the front end can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Home,
    Login,
    OAuthCallback,
    Admin,
    AdminTiers,
    AdminSettings,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub name: &'static str,
    pub page: Page,
}

pub const ROUTES: &[Route] = &[
    Route { path: "/", name: "home", page: Page::Home },
    Route { path: "/login", name: "login", page: Page::Login },
    Route { path: "/callback", name: "callback", page: Page::OAuthCallback },
    Route { path: "/admin", name: "admin", page: Page::Admin },
    Route { path: "/admin/tiers", name: "admin-tiers", page: Page::AdminTiers },
    Route { path: "/admin/settings", name: "admin-settings", page: Page::AdminSettings },
];

/// Catch-all for paths no entry in [`ROUTES`] matches.
pub const NOT_FOUND: Route = Route {
    path: "/:pathMatch(.*)*",
    name: "not-found",
    page: Page::NotFound,
};

/// Paths reachable without a session.
const PUBLIC_ROUTES: [&str; 2] = ["/login", "/callback"];

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

pub fn resolve(path: &str) -> &'static Route {
    let path = normalize(path);
    ROUTES
        .iter()
        .find(|route| route.path.eq_ignore_ascii_case(path))
        .unwrap_or(&NOT_FOUND)
}

pub fn by_name(name: &str) -> Option<&'static Route> {
    ROUTES.iter().chain([&NOT_FOUND]).find(|route| route.name == name)
}

/// Outcome of the navigation guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect(&'static str),
}

/// Send visitors without a token to the login page, except for the login
/// and callback pages themselves.
pub fn guard(path: &str, has_token: bool) -> Navigation {
    let path = normalize(path);
    if has_token || PUBLIC_ROUTES.iter().any(|p| p.eq_ignore_ascii_case(path)) {
        Navigation::Proceed
    } else {
        Navigation::Redirect("/login")
    }
}
