use std::env;

use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_types::region::Region;

/// Get the configuration to authn/authz with AWS that will be used across AWS clients
///
/// An explicit region wins over `AWS_REGION`, which wins over the default provider chain
pub async fn get_config(region: Option<&str>) -> aws_config::SdkConfig {
  let aws_region = match region {
    Some(region) => Some(Region::new(region.to_owned())),
    None => env::var("AWS_REGION").ok().map(Region::new),
  };

  let region_provider = RegionProviderChain::first_try(aws_region).or_default_provider();

  aws_config::defaults(BehaviorVersion::latest())
    .region(region_provider)
    .load()
    .await
}
