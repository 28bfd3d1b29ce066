//! API specification document served at `GET /`.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::config::ServerConfig;

use super::definition::RouteDefinition;

/// Swagger-2.0 shaped description of the composed API, rendered once.
#[derive(Debug)]
pub struct ApiSpecification {
    document: Value,
    rendered: Bytes,
}

impl ApiSpecification {
    pub fn build(server: &ServerConfig, groups: &[(String, Vec<RouteDefinition>)]) -> Self {
        let host = server
            .public_host
            .clone()
            .unwrap_or_else(|| server.bind_address());

        let tags: Vec<Value> = groups.iter().map(|(name, _)| json!({ "name": name })).collect();

        let mut paths = Map::new();
        for (group, routes) in groups {
            for route in routes {
                let mut operation = json!({ "tags": [group] });
                if let Some(summary) = &route.summary {
                    operation["summary"] = json!(summary);
                }
                if route.authenticated {
                    operation["security"] = json!([{ "bearer": [] }]);
                }
                let entry = paths
                    .entry(route.path.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                entry[route.method.as_str().to_ascii_lowercase()] = operation;
            }
        }

        let document = json!({
            "swagger": "2.0",
            "info": {
                "title": "Storj Bridge",
                "version": env!("CARGO_PKG_VERSION"),
                "description": "Storage bridge API",
            },
            "host": host,
            "basePath": "/",
            "schemes": ["http"],
            "tags": tags,
            "paths": paths,
            "securityDefinitions": {
                "bearer": { "type": "apiKey", "name": "Authorization", "in": "header" }
            },
        });
        let rendered = Bytes::from(document.to_string());

        Self { document, rendered }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Serialized form returned by `GET /`.
    pub fn rendered(&self) -> &Bytes {
        &self.rendered
    }
}

/// Handler for `GET /`.
pub async fn serve_specification(State(specification): State<Arc<ApiSpecification>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        Body::from(specification.rendered.clone()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<(String, Vec<RouteDefinition>)> {
        vec![
            (
                "users".to_string(),
                vec![RouteDefinition::post("/users", || async { "ok" }).summary("Register a user")],
            ),
            (
                "keys".to_string(),
                vec![
                    RouteDefinition::get("/keys", || async { "[]" }).authenticated(),
                    RouteDefinition::post("/keys", || async { "ok" }).authenticated(),
                ],
            ),
        ]
    }

    #[test]
    fn document_lists_tags_and_paths() {
        let spec = ApiSpecification::build(&ServerConfig::default(), &groups());
        let doc = spec.document();

        assert_eq!(doc["swagger"], "2.0");
        assert_eq!(doc["host"], "127.0.0.1:6382");
        assert_eq!(doc["tags"][0]["name"], "users");
        assert_eq!(doc["tags"][1]["name"], "keys");
        assert_eq!(doc["paths"]["/users"]["post"]["summary"], "Register a user");
        assert!(doc["paths"]["/keys"]["get"]["security"].is_array());
        assert!(doc["paths"]["/keys"]["post"].is_object());
    }

    #[test]
    fn public_host_overrides_bind_address() {
        let server = ServerConfig {
            public_host: Some("api.example.com".into()),
            ..ServerConfig::default()
        };
        let spec = ApiSpecification::build(&server, &[]);
        assert_eq!(spec.document()["host"], "api.example.com");
    }

    #[test]
    fn rendered_matches_document() {
        let spec = ApiSpecification::build(&ServerConfig::default(), &groups());
        let parsed: Value = serde_json::from_slice(spec.rendered()).unwrap();
        assert_eq!(&parsed, spec.document());
    }
}
