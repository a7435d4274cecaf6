//! Search service - filtered lead listings and CSV export.
//!
//! The viewer's scope is always applied before the user's facets.

use std::sync::Arc;

use async_trait::async_trait;

use common::{AppResult, Paginated, PaginationParams};
use domain::{
    Capability, Lead, LeadField, LeadQuery, LeadView, StaffContext, MAX_EXPORT_ROWS,
    MAX_PAGE_SIZE,
};

use crate::repository::LeadRepository;

#[async_trait]
pub trait SearchService: Send + Sync {
    /// One page of visible leads projected through the caller's fields.
    async fn query(
        &self,
        ctx: &StaffContext,
        query: LeadQuery,
        page: PaginationParams,
    ) -> AppResult<Paginated<LeadView>>;

    /// Every matching lead as CSV, restricted to the caller's columns.
    async fn export_csv(&self, ctx: &StaffContext, query: LeadQuery) -> AppResult<String>;
}

/// Concrete implementation of SearchService.
pub struct LeadSearch {
    leads: Arc<dyn LeadRepository>,
}

impl LeadSearch {
    pub fn new(leads: Arc<dyn LeadRepository>) -> Self {
        Self { leads }
    }
}

/// RFC 4180 field quoting.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    cells.map(csv_field).collect::<Vec<_>>().join(",")
}

fn to_csv(columns: &[LeadField], leads: &[Lead]) -> String {
    let mut out = csv_row(columns.iter().map(LeadField::as_str));
    out.push_str("\r\n");
    for lead in leads {
        let cells: Vec<String> = columns.iter().map(|field| lead.cell(*field)).collect();
        out.push_str(&csv_row(cells.iter().map(String::as_str)));
        out.push_str("\r\n");
    }
    out
}

#[async_trait]
impl SearchService for LeadSearch {
    async fn query(
        &self,
        ctx: &StaffContext,
        query: LeadQuery,
        page: PaginationParams,
    ) -> AppResult<Paginated<LeadView>> {
        let (leads, total) = self
            .leads
            .fetch_filtered(&query, ctx.scope(), ctx.staff_id, page)
            .await?;

        Ok(Paginated::new(leads, page, total).map(|lead| lead.project(&ctx.visible_fields)))
    }

    async fn export_csv(&self, ctx: &StaffContext, query: LeadQuery) -> AppResult<String> {
        ctx.require(Capability::ExportData)?;

        let mut rows: Vec<Lead> = Vec::new();
        let mut page = 1;
        loop {
            let params = PaginationParams::new(page, MAX_PAGE_SIZE);
            let (batch, total) = self
                .leads
                .fetch_filtered(&query, ctx.scope(), ctx.staff_id, params)
                .await?;
            let fetched = batch.len() as u64;
            rows.extend(batch);

            let cap = total.min(MAX_EXPORT_ROWS);
            if fetched == 0 || rows.len() as u64 >= cap {
                rows.truncate(cap as usize);
                break;
            }
            page += 1;
        }

        let columns: Vec<LeadField> = LeadField::ALL
            .into_iter()
            .filter(|field| ctx.sees(*field))
            .collect();

        tracing::info!(staff = %ctx.email, rows = rows.len(), "Lead export");
        Ok(to_csv(&columns, &rows))
    }
}
