// policy/mod.rs - Role-based access policy for dashboard routes
//
// Pure decision function: no I/O, no shared state. The access middleware
// resolves identity and role, then asks `decide` what to do with the path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const ADMIN_HOME: &str = "/dashboard/admin";
pub const INSTRUCTOR_HOME: &str = "/dashboard/instructor";
pub const STUDENT_HOME: &str = "/dashboard/student";
pub const UNAUTHORIZED_PATH: &str = "/dashboard/unauthorized";

/// Query parameter carrying the originally requested path through login.
pub const REDIRECT_PARAM: &str = "redirect";

/// The three roles a profile can carry. A profile with any other stored value
/// has no role at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Instructor, Role::Student];

    /// Exact, case-sensitive match on the stored text.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "instructor" => Some(Role::Instructor),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| format!("unknown role '{}' (expected admin, instructor or student)", s))
    }
}

/// Which policy rule family a request path falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Public,
    AuthPage,
    DashboardAdmin,
    DashboardInstructor,
    DashboardStudent,
    DashboardGeneric,
    DashboardShared,
    Unclassified,
}

impl RouteClass {
    pub const ALL: [RouteClass; 8] = [
        RouteClass::Public,
        RouteClass::AuthPage,
        RouteClass::DashboardAdmin,
        RouteClass::DashboardInstructor,
        RouteClass::DashboardStudent,
        RouteClass::DashboardGeneric,
        RouteClass::DashboardShared,
        RouteClass::Unclassified,
    ];

    pub fn is_dashboard(self) -> bool {
        matches!(
            self,
            RouteClass::DashboardAdmin
                | RouteClass::DashboardInstructor
                | RouteClass::DashboardStudent
                | RouteClass::DashboardGeneric
                | RouteClass::DashboardShared
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::Public => "public",
            RouteClass::AuthPage => "auth-page",
            RouteClass::DashboardAdmin => "dashboard-admin",
            RouteClass::DashboardInstructor => "dashboard-instructor",
            RouteClass::DashboardStudent => "dashboard-student",
            RouteClass::DashboardGeneric => "dashboard-generic",
            RouteClass::DashboardShared => "dashboard-shared",
            RouteClass::Unclassified => "unclassified",
        }
    }
}

/// Classify a request path. Public and auth pages match exactly; dashboard
/// areas match by prefix so nested routes inherit their area's rule.
pub fn classify_route(path: &str) -> RouteClass {
    match path {
        ROOT_PATH => RouteClass::Public,
        LOGIN_PATH | SIGNUP_PATH => RouteClass::AuthPage,
        DASHBOARD_PATH => RouteClass::DashboardGeneric,
        p if p.starts_with(ADMIN_HOME) => RouteClass::DashboardAdmin,
        p if p.starts_with(INSTRUCTOR_HOME) => RouteClass::DashboardInstructor,
        p if p.starts_with(STUDENT_HOME) => RouteClass::DashboardStudent,
        p if p.starts_with(DASHBOARD_PATH) => RouteClass::DashboardShared,
        _ => RouteClass::Unclassified,
    }
}

/// Landing page for a role. Callers without a role land on the generic dashboard.
pub fn role_home(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Admin) => ADMIN_HOME,
        Some(Role::Instructor) => INSTRUCTOR_HOME,
        Some(Role::Student) => STUDENT_HOME,
        None => DASHBOARD_PATH,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Redirect {
        target: &'static str,
        /// Append the requested path as `?redirect=` so login can send the caller back.
        preserve_intent: bool,
    },
}

impl AccessDecision {
    fn redirect(target: &'static str) -> Self {
        AccessDecision::Redirect { target, preserve_intent: false }
    }

    fn redirect_to_login() -> Self {
        AccessDecision::Redirect { target: LOGIN_PATH, preserve_intent: true }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    /// The `Location` value for a redirect, or `None` when the request may proceed.
    pub fn location(&self, requested_path: &str) -> Option<String> {
        match *self {
            AccessDecision::Allow => None,
            AccessDecision::Redirect { target, preserve_intent: false } => Some(target.to_string()),
            AccessDecision::Redirect { target, preserve_intent: true } => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair(REDIRECT_PARAM, requested_path)
                    .finish();
                Some(format!("{}?{}", target, query))
            }
        }
    }
}

/// Decide whether a caller may reach `path`. Rules are evaluated in order and
/// the first match wins.
pub fn decide(authenticated: bool, role: Option<Role>, path: &str) -> AccessDecision {
    let class = classify_route(path);

    if class == RouteClass::Public {
        return AccessDecision::Allow;
    }

    if !authenticated {
        if class.is_dashboard() {
            return AccessDecision::redirect_to_login();
        }
        return AccessDecision::Allow;
    }

    match class {
        RouteClass::AuthPage => AccessDecision::redirect(role_home(role)),
        RouteClass::DashboardAdmin if role != Some(Role::Admin) => {
            AccessDecision::redirect(UNAUTHORIZED_PATH)
        }
        RouteClass::DashboardInstructor if !matches!(role, Some(Role::Instructor | Role::Admin)) => {
            AccessDecision::redirect(UNAUTHORIZED_PATH)
        }
        RouteClass::DashboardStudent if !matches!(role, Some(Role::Student | Role::Admin)) => {
            AccessDecision::redirect(UNAUTHORIZED_PATH)
        }
        // The generic dashboard is the home of callers without a role, so only
        // callers with one are sent on.
        RouteClass::DashboardGeneric if role.is_some() => AccessDecision::redirect(role_home(role)),
        _ => AccessDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [Option<Role>; 4] = [None, Some(Role::Admin), Some(Role::Instructor), Some(Role::Student)];

    /// One representative path per class.
    fn sample_path(class: RouteClass) -> &'static str {
        match class {
            RouteClass::Public => "/",
            RouteClass::AuthPage => "/login",
            RouteClass::DashboardAdmin => "/dashboard/admin/students",
            RouteClass::DashboardInstructor => "/dashboard/instructor/attendance",
            RouteClass::DashboardStudent => "/dashboard/student/browse",
            RouteClass::DashboardGeneric => "/dashboard",
            RouteClass::DashboardShared => "/dashboard/unauthorized",
            RouteClass::Unclassified => "/health",
        }
    }

    fn expected(authenticated: bool, role: Option<Role>, class: RouteClass) -> AccessDecision {
        use AccessDecision::{Allow, Redirect};
        let unauthorized = Redirect { target: UNAUTHORIZED_PATH, preserve_intent: false };

        match (authenticated, class) {
            (_, RouteClass::Public) => Allow,
            (false, c) if c.is_dashboard() => Redirect { target: LOGIN_PATH, preserve_intent: true },
            (false, _) => Allow,
            (true, RouteClass::AuthPage) => Redirect { target: role_home(role), preserve_intent: false },
            (true, RouteClass::DashboardAdmin) => match role {
                Some(Role::Admin) => Allow,
                _ => unauthorized,
            },
            (true, RouteClass::DashboardInstructor) => match role {
                Some(Role::Admin) | Some(Role::Instructor) => Allow,
                _ => unauthorized,
            },
            (true, RouteClass::DashboardStudent) => match role {
                Some(Role::Admin) | Some(Role::Student) => Allow,
                _ => unauthorized,
            },
            (true, RouteClass::DashboardGeneric) => match role {
                Some(r) => Redirect { target: role_home(Some(r)), preserve_intent: false },
                None => Allow,
            },
            (true, RouteClass::DashboardShared) | (true, RouteClass::Unclassified) => Allow,
        }
    }

    #[test]
    fn sample_paths_classify_as_intended() {
        for class in RouteClass::ALL {
            assert_eq!(classify_route(sample_path(class)), class);
        }
    }

    #[test]
    fn decision_table_covers_full_cross_product() {
        for authenticated in [false, true] {
            for role in ROLES {
                for class in RouteClass::ALL {
                    let path = sample_path(class);
                    assert_eq!(
                        decide(authenticated, role, path),
                        expected(authenticated, role, class),
                        "authenticated={} role={:?} path={}",
                        authenticated,
                        role,
                        path
                    );
                }
            }
        }
    }

    #[test]
    fn redirect_targets_never_redirect_again() {
        for authenticated in [false, true] {
            for role in ROLES {
                for class in RouteClass::ALL {
                    if let AccessDecision::Redirect { target, .. } = decide(authenticated, role, sample_path(class)) {
                        assert!(
                            decide(authenticated, role, target).is_allow(),
                            "redirect loop: authenticated={} role={:?} from {} to {}",
                            authenticated,
                            role,
                            sample_path(class),
                            target
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn anonymous_dashboard_request_preserves_intent() {
        let decision = decide(false, None, "/dashboard/admin/students");
        assert_eq!(
            decision.location("/dashboard/admin/students").as_deref(),
            Some("/login?redirect=%2Fdashboard%2Fadmin%2Fstudents")
        );
    }

    #[test]
    fn student_on_admin_area_is_unauthorized() {
        assert_eq!(
            decide(true, Some(Role::Student), "/dashboard/admin/courses"),
            AccessDecision::Redirect { target: UNAUTHORIZED_PATH, preserve_intent: false }
        );
    }

    #[test]
    fn admin_reaches_every_area() {
        for path in ["/dashboard/admin", "/dashboard/instructor/attendance", "/dashboard/student/courses"] {
            assert!(decide(true, Some(Role::Admin), path).is_allow(), "{}", path);
        }
    }

    #[test]
    fn instructor_on_generic_dashboard_goes_home() {
        let decision = decide(true, Some(Role::Instructor), "/dashboard");
        assert_eq!(decision.location("/dashboard").as_deref(), Some(INSTRUCTOR_HOME));
    }

    #[test]
    fn roleless_caller_stays_on_generic_dashboard() {
        assert!(decide(true, None, "/dashboard").is_allow());
        assert_eq!(
            decide(true, None, "/login"),
            AccessDecision::Redirect { target: DASHBOARD_PATH, preserve_intent: false }
        );
    }

    #[test]
    fn anonymous_callers_reach_auth_pages() {
        assert!(decide(false, None, "/login").is_allow());
        assert!(decide(false, None, "/signup").is_allow());
        assert!(decide(false, None, "/").is_allow());
    }

    #[test]
    fn dashboard_prefixes_cover_nested_and_adjacent_paths() {
        assert_eq!(classify_route("/dashboard/admin/students/42/enrollments"), RouteClass::DashboardAdmin);
        // Prefix match has no segment boundary.
        assert_eq!(classify_route("/dashboard/administrator"), RouteClass::DashboardAdmin);
        assert_eq!(classify_route("/dashboard/"), RouteClass::DashboardShared);
        assert_eq!(classify_route("/dashboardx"), RouteClass::DashboardShared);
        assert_eq!(classify_route("/dashboard/insight"), RouteClass::DashboardShared);
    }

    #[test]
    fn auth_pages_match_exactly() {
        assert_eq!(classify_route("/login/"), RouteClass::Unclassified);
        assert_eq!(classify_route("/signup-later"), RouteClass::Unclassified);
        assert_eq!(classify_route("/auth/signout"), RouteClass::Unclassified);
        assert_eq!(classify_route(""), RouteClass::Unclassified);
    }

    #[test]
    fn role_parsing_is_exact() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse(" student"), None);
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn unknown_role_is_treated_like_no_role() {
        let role = Role::parse("Admin");
        assert_eq!(
            decide(true, role, "/dashboard/admin"),
            AccessDecision::Redirect { target: UNAUTHORIZED_PATH, preserve_intent: false }
        );
    }

    #[test]
    fn allow_has_no_location() {
        assert_eq!(AccessDecision::Allow.location("/dashboard"), None);
    }
}
