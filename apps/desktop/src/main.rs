use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    agents::AgentSwarm,
    config::{load_settings, normalize_api_base},
    controller::{fallback_vendor, DemoIdentity, StageController},
    graph::project,
    marketplace::Marketplace,
    shell::{sidebar, ShellAction},
    Gateway, HttpGateway, Settings,
};
use shared::{
    domain::{FarmerId, UserId, VendorId, WorkflowStage},
    protocol::LoanRequest,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "purposepay", about = "PurposePay goods-financing workflow client")]
struct Args {
    /// Lending backend base URL; overrides purposepay.toml and environment.
    #[arg(long, global = true)]
    api_base: Option<String>,
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the supply-chain-finance workflow from risk assessment to escrow.
    Workflow {
        #[arg(long, default_value = "Fertilizer")]
        category: String,
    },
    /// Print the topology graph for a stage using the simulated vendor.
    Graph {
        #[arg(long)]
        stage: WorkflowStage,
    },
    /// Run the agent swarm for a loan request and print its transcript.
    Agents {
        #[arg(long, default_value = "Urea Fertilizer")]
        item: String,
        #[arg(long, default_value_t = 50)]
        quantity: u32,
        #[arg(long, default_value = "V-9988")]
        vendor_id: String,
        #[arg(long, default_value = "F-1024")]
        farmer_id: String,
    },
    /// Add catalogue products to the cart and place an order.
    Order {
        #[arg(required = true)]
        products: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings().context("failed to load settings")?;
    if let Some(api_base) = &args.api_base {
        settings.api_base = normalize_api_base(api_base)?;
    }
    info!(api_base = %settings.api_base, "using lending backend");

    match args.command {
        Command::Workflow { category } => run_workflow(&settings, &category, args.json).await,
        Command::Graph { stage } => print_graph(stage, args.json),
        Command::Agents {
            item,
            quantity,
            vendor_id,
            farmer_id,
        } => {
            let request = LoanRequest {
                item,
                quantity,
                vendor_id: VendorId::new(vendor_id),
                farmer_id: FarmerId::new(farmer_id),
            };
            run_agents(&settings, &request, args.json).await
        }
        Command::Order { products } => place_order(&settings, &products, args.json).await,
    }
}

async fn run_workflow(settings: &Settings, category: &str, json: bool) -> Result<()> {
    let gateway = HttpGateway::from_settings(settings)?;
    let controller = StageController::with_identity(
        gateway,
        DemoIdentity {
            user_id: UserId::new(settings.demo_user_id.clone()),
            credit_score: settings.demo_credit_score,
        },
    );

    controller.start().await?;
    show_stage(&controller, json)?;

    let snapshot = controller.snapshot();
    if !snapshot.risk.as_ref().is_some_and(|r| r.agent_triggered) {
        println!("Agent flow not triggered; nothing further to do.");
        return Ok(());
    }

    for action in [
        ShellAction::Explore,
        ShellAction::SelectCategory(category.to_string()),
        ShellAction::ApprovePurchase,
    ] {
        controller.dispatch(action).await?;
        show_stage(&controller, json)?;
    }

    if let Some(fallback) = controller.snapshot().last_fallback {
        eprintln!(
            "note: {:?} used simulated data ({})",
            fallback.operation,
            fallback
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "empty response".into())
        );
    }
    Ok(())
}

fn show_stage<G: Gateway>(controller: &StageController<G>, json: bool) -> Result<()> {
    let snapshot = controller.snapshot();
    if json {
        let view = serde_json::json!({
            "state": &snapshot,
            "sidebar": sidebar(&snapshot),
            "graph": snapshot.graph(),
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("{}", render::header(snapshot.stage));
        print!("{}", render::panel(&sidebar(&snapshot)));
        println!("{}", render::graph(&snapshot.graph()));
    }
    Ok(())
}

fn print_graph(stage: WorkflowStage, json: bool) -> Result<()> {
    let vendors = if stage >= WorkflowStage::Verification {
        vec![fallback_vendor()]
    } else {
        Vec::new()
    };
    let graph = project(stage, &vendors, vendors.first());
    if json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
    } else {
        print!("{}", render::graph(&graph));
    }
    Ok(())
}

async fn run_agents(settings: &Settings, request: &LoanRequest, json: bool) -> Result<()> {
    let swarm = AgentSwarm::new(HttpGateway::from_settings(settings)?);
    let transcript = swarm.run(request).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&transcript)?);
    } else {
        print!("{}", render::transcript(&transcript));
    }
    if !transcript.is_success() {
        bail!("agent swarm did not complete the loan request");
    }
    Ok(())
}

async fn place_order(settings: &Settings, products: &[String], json: bool) -> Result<()> {
    let gateway = HttpGateway::from_settings(settings)?;
    let mut market = Marketplace::default();
    for product in products {
        market.add_to_cart(product)?;
    }
    let order = market.place_order(&gateway).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(order)?);
    } else {
        print!("{}", render::order(order));
    }
    Ok(())
}
