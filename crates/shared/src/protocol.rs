use crate::domain::PersonId;

pub const PERSONS_ROUTE: &str = "/api/persons";

pub fn person_route(id: PersonId) -> String {
    format!("{PERSONS_ROUTE}/{}", id.0)
}

pub fn info_route() -> &'static str {
    "/info"
}

pub fn healthz_route() -> &'static str {
    "/healthz"
}
