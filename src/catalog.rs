use anyhow::Context;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

const EMBEDDED: &str = include_str!("../data/pokemon.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: u32,
    pub name: String,
    pub types: Vec<String>,
}

/// Read-only Pokémon reference list, sorted by id.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<Pokemon>,
}

impl Catalog {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let mut entries: Vec<Pokemon> = serde_json::from_str(raw).context("parse pokemon catalog")?;
        entries.sort_by_key(|p| p.id);
        let before = entries.len();
        entries.dedup_by_key(|p| p.id);
        anyhow::ensure!(entries.len() == before, "pokemon catalog has duplicate ids");
        Ok(Self { entries })
    }

    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_json(EMBEDDED)
    }

    /// `path` overrides the embedded list when given.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("read pokemon catalog {p}"))?;
                let catalog = Self::from_json(&raw)?;
                info!(path = %p, count = catalog.entries.len(), "pokemon catalog loaded from file");
                Ok(catalog)
            }
            None => Self::embedded(),
        }
    }

    pub fn entries(&self) -> &[Pokemon] {
        &self.entries
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub ok: bool,
    pub data: Vec<Pokemon>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/list", get(list_pokemon))
}

pub async fn list_pokemon(State(state): State<AppState>) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        ok: true,
        data: state.catalog.entries().to_vec(),
    })
}
