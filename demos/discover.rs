use clap::Parser;
use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig},
};
use kube_apimap::{
    ApiMapCache, DiscoverClient, DiscoveryConfig, Lookup, ResourceMapping, discover,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "kube-apimap-discover",
    about = "Discover the group-version serving each resource of a cluster"
)]
struct Cli {
    /// Kubernetes context to target, defaults to the current context.
    #[arg(long)]
    context: Option<String>,
    /// Resource to resolve, e.g. `deployment`. Prints the whole map when omitted.
    #[arg(long)]
    resource: Option<String>,
    /// Number of version components in the cluster version key.
    #[arg(long, default_value_t = kube_apimap::cluster::DEFAULT_PRECISION)]
    precision: usize,
    /// Maximum number of concurrent discovery requests.
    #[arg(long, default_value_t = kube_apimap::config::DEFAULT_CONCURRENCY)]
    concurrency: usize,
    /// Print the map as JSON.
    #[arg(long)]
    json: bool,
}

fn print_mapping(name: &str, mapping: &ResourceMapping) {
    let scope = if mapping.namespaced() {
        "namespaced"
    } else {
        "cluster"
    };
    println!("{name} {} {scope}", mapping.group_version());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let context = match cli.context {
        Some(context) => context,
        None => Kubeconfig::read()?
            .current_context
            .ok_or_else(|| anyhow::anyhow!("current_context is not set"))?,
    };
    let options = KubeConfigOptions {
        context: Some(context.clone()),
        ..Default::default()
    };
    let client = Client::try_from(Config::from_kubeconfig(&options).await?)?;
    eprintln!("context={context}");

    let config = DiscoveryConfig::default()
        .with_precision(cli.precision)
        .with_concurrency(cli.concurrency);
    let cache = ApiMapCache::new();
    let outcome = discover(&DiscoverClient::new(client), &cache, &config).await?;
    for failure in outcome.failures() {
        eprintln!("warning: {failure}");
    }
    let cluster = outcome.cluster().clone();
    eprintln!("cluster version={cluster}");

    let map = match cli.resource {
        Some(resource) => match cache.lookup(&cluster, &resource) {
            Lookup::Found(mapping) => {
                print_mapping(&resource, &mapping);
                return Ok(());
            }
            Lookup::FallbackAll(map) => {
                eprintln!("{resource} not found, listing all resources");
                map
            }
            Lookup::UnknownCluster => anyhow::bail!("no resources discovered for {cluster}"),
        },
        None => outcome.into_map(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        for (name, mapping) in map.iter() {
            print_mapping(name, mapping);
        }
    }
    Ok(())
}
