//! Prints the CRD manifests as a multi-document YAML stream.
//!
//! `cargo run -p crds --bin crdgen > config/crd/bases/crds.yaml`

use crds::{NetworkInfo, VPCNetworkConfiguration};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [NetworkInfo::crd(), VPCNetworkConfiguration::crd()];
    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
