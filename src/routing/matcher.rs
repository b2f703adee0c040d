//! Route matching module
//!
//! Maps a request path onto a collection route (`/users`) or an item route
//! (`/users/<id>`).

/// Which collection a path addresses, and the raw id segment if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// Index into the routes slice
    pub index: usize,
    pub id: Option<&'a str>,
}

/// Find the first route addressing `path`.
///
/// `/users` and `/users/` match the collection, `/users/7` matches item 7.
/// Deeper paths such as `/users/7/posts` match nothing.
pub fn match_route<'a>(path: &'a str, routes: &[&str]) -> Option<RouteMatch<'a>> {
    routes.iter().enumerate().find_map(|(index, route)| {
        let rest = path.strip_prefix(*route)?;
        match rest {
            "" | "/" => Some(RouteMatch { index, id: None }),
            _ => {
                let id = rest.strip_prefix('/')?;
                (!id.contains('/')).then_some(RouteMatch {
                    index,
                    id: Some(id),
                })
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTES: [&str; 3] = ["/users", "/api/products", "/user"];

    #[test]
    fn test_collection_path() {
        assert_eq!(
            match_route("/users", &ROUTES),
            Some(RouteMatch { index: 0, id: None })
        );
        assert_eq!(
            match_route("/users/", &ROUTES),
            Some(RouteMatch { index: 0, id: None })
        );
    }

    #[test]
    fn test_item_path() {
        assert_eq!(
            match_route("/users/42", &ROUTES),
            Some(RouteMatch {
                index: 0,
                id: Some("42")
            })
        );
        assert_eq!(
            match_route("/api/products/abc", &ROUTES),
            Some(RouteMatch {
                index: 1,
                id: Some("abc")
            })
        );
    }

    #[test]
    fn test_prefix_must_end_at_segment() {
        // "/userss" is not "/users" + id, and falls through to no match
        assert_eq!(match_route("/userss", &ROUTES), None);
        // "/user" is its own route, not a prefix of "/users"
        assert_eq!(
            match_route("/user/1", &ROUTES),
            Some(RouteMatch {
                index: 2,
                id: Some("1")
            })
        );
    }

    #[test]
    fn test_unmatched() {
        assert_eq!(match_route("/", &ROUTES), None);
        assert_eq!(match_route("/products", &ROUTES), None);
        assert_eq!(match_route("/users/1/posts", &ROUTES), None);
    }
}
