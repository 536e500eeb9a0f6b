//! `courier demo`: one campaign and one queued segment over synthetic customers,
//! run to completion without the HTTP surface.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{Duration as ChronoDuration, Utc};
use courier_core::app::{CampaignRequest, CampaignSummary, PipelineStatus};
use courier_core::domain::campaign::Campaign;
use courier_core::domain::customer::Customer;
use courier_core::domain::rule::Rule;
use courier_core::filter::translate;
use courier_core::impls::InMemoryCustomerStore;
use courier_core::ports::{CampaignStore, CommunicationLogStore};
use serde::Serialize;
use tracing::info;

use crate::config::DemoArgs;
use crate::server::build_pipeline;

const CATEGORIES: [&str; 4] = ["electronics", "fashion", "home", "books"];
const SOURCES: [&str; 3] = ["web", "store", "referral"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoReport {
    pub customers: usize,
    pub campaign: CampaignSummary,
    /// Stored record after every receipt was reconciled.
    pub reconciled: Campaign,
    pub segment_entries: usize,
    pub segment_pending: usize,
    pub batches_dispatched: usize,
    pub status: PipelineStatus,
}

/// Deterministic customer set: spend, visits and recency spread across ids.
pub fn synthetic_customers(count: usize) -> Vec<Customer> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let mut c = Customer::new(format!("cust-{i:05}"), format!("Customer {i}"));
            if i % 2 == 0 {
                c.phone = Some(format!("+1555{i:07}"));
            } else {
                c.email = Some(format!("customer{i}@example.com"));
            }
            c.spend = Some(((i * 137) % 5_000) as f64);
            c.visits = Some((i % 12) as f64);
            c.orders = Some((i % 7) as f64);
            c.last_active = Some(now - ChronoDuration::days((i % 90) as i64));
            c.preferred_category = Some(CATEGORIES[i % CATEGORIES.len()].to_string());
            c.source = Some(SOURCES[i % SOURCES.len()].to_string());
            c
        })
        .collect()
}

pub async fn execute(args: &DemoArgs) -> Result<DemoReport> {
    args.pipeline.validate()?;

    let customers = InMemoryCustomerStore::with_customers(synthetic_customers(args.customers));
    let pipeline = build_pipeline(&args.pipeline, Arc::new(customers))
        .build()
        .context("failed to build pipeline")?;

    let campaign_rules = vec![Rule::new("spend", ">", "1000").and(), Rule::new("visits", ">=", "3")];
    let preview = pipeline.preview(&campaign_rules).await?;
    info!(audience = preview.count, degraded = preview.degraded, "campaign audience previewed");

    let campaign = pipeline
        .run_campaign(CampaignRequest {
            owner_id: "demo".into(),
            name: "High spenders".into(),
            tag: "demo".into(),
            segment_id: "seg-high-spend".into(),
            message: "Thanks for being a loyal customer".into(),
            audience_filter: translate(&campaign_rules)?,
            campaign_id: None,
        })
        .await?;

    let segment_rules = vec![Rule::new("preferred_category", "=", "books").or(), Rule::new("source", "=", "referral")];
    pipeline
        .submit_segment("seg-readers", "New arrivals this week", &segment_rules, None)
        .await?;

    let batches_dispatched = pipeline.settle().await?;

    let reconciled = pipeline
        .campaigns()
        .get(&campaign.campaign_id)
        .await?
        .ok_or_else(|| anyhow!("campaign {} disappeared", campaign.campaign_id))?;
    let segment = pipeline.logs().by_segment("seg-readers").await?;
    let status = pipeline.status().await?;

    Ok(DemoReport {
        customers: args.customers,
        campaign,
        reconciled,
        segment_entries: segment.len(),
        segment_pending: segment.iter().filter(|e| e.is_pending()).count(),
        batches_dispatched,
        status,
    })
}

pub async fn run(args: DemoArgs) -> Result<()> {
    let report = execute(&args).await?;
    info!(
        campaign_id = %report.campaign.campaign_id,
        sent = report.reconciled.sent_count,
        failed = report.reconciled.failed_count,
        "demo finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineArgs;

    fn args(customers: usize, success_probability: f64) -> DemoArgs {
        DemoArgs {
            customers,
            pipeline: PipelineArgs {
                batch_size: 50,
                tick_ms: 5_000,
                success_probability,
                seed: Some(7),
            },
        }
    }

    #[test]
    fn synthetic_customers_alternate_channels() {
        let customers = synthetic_customers(4);
        assert_eq!(customers.len(), 4);
        assert!(customers[0].phone.is_some() && customers[0].email.is_none());
        assert!(customers[1].email.is_some() && customers[1].phone.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn every_send_is_reconciled() {
        let report = execute(&args(300, 1.0)).await.unwrap();

        assert!(report.campaign.audience_size > 0);
        assert_eq!(report.campaign.failed, 0);
        assert_eq!(report.reconciled.sent_count as usize, report.campaign.audience_size);
        assert_eq!(report.reconciled.failed_count, 0);

        assert!(report.segment_entries > 0);
        assert_eq!(report.segment_pending, 0);
        assert!(report.status.is_quiescent());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_reach_the_campaign_counters() {
        let report = execute(&args(200, 0.0)).await.unwrap();

        assert_eq!(report.campaign.sent, 0);
        assert_eq!(report.reconciled.sent_count, 0);
        assert_eq!(report.reconciled.failed_count as usize, report.campaign.audience_size);
    }
}
