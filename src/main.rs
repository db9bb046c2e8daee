use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use property_scout::models::{PostcodeLookupCriteria, SearchCriteria};
use property_scout::{lookup_postcodes, search_properties, shared_store, SparqlClient};

const DEFAULT_ENDPOINT: &str = "http://landregistry.data.gov.uk/landregistry/query";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.split_first() {
        Some((cmd, rest)) if cmd == "search" && !rest.is_empty() => {
            let postcode = rest.join(" ");
            let endpoint =
                std::env::var("LAND_REGISTRY_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.into());
            info!("searching price-paid transactions for {}", postcode);

            let client = SparqlClient::new()?;
            let criteria = SearchCriteria {
                postcode: Some(postcode),
                ..Default::default()
            };
            let result = search_properties(&endpoint, &client, &criteria)
                .await
                .context("property search failed")?;

            info!(
                "{} matching transactions, showing {}",
                result.total,
                result.properties.len()
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Some((cmd, rest)) if cmd == "nearby" && !rest.is_empty() => {
            let postcode = rest.join(" ");
            info!("looking up postcodes near {}", postcode);

            let store = shared_store(None)?;
            let criteria = PostcodeLookupCriteria {
                postcode: Some(postcode),
                ..Default::default()
            };
            let result = lookup_postcodes(&store, &criteria).context("postcode lookup failed")?;

            info!("{} postcodes in range", result.total);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            bail!(
                "usage: property-scout search <postcode> | property-scout nearby <postcode>"
            );
        }
    }

    Ok(())
}
