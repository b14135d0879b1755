//! A user-function process serving a counter and a shopping cart.
//!
//! ```text
//! PORT=8080 cargo run -p crdt-host --example counter_service
//! ```
//!
//! Reads `user-function.desc` from the working directory.

use bytes::Bytes;
use tracing::Level;

use crdt_host::core::{CrdtKind, CrdtOperation, CrdtValue, Element};
use crdt_host::protocol::{HostClient, ProxyInfo};
use crdt_host::{host_config, CommandContext, EntityDefinition, EntityHost};

fn counter(ctx: &mut CommandContext<'_>, name: &str, payload: &Bytes) -> anyhow::Result<Bytes> {
    if name == "Increment" {
        let by: i64 = std::str::from_utf8(payload)?.trim().parse()?;
        ctx.mutate(CrdtOperation::Increment(by))?;
    }
    Ok(Bytes::from(ctx.state().to_string()))
}

fn cart(ctx: &mut CommandContext<'_>, name: &str, payload: &Bytes) -> anyhow::Result<Bytes> {
    let item = Element::from(payload.clone());
    match name {
        "AddItem" => ctx.mutate(CrdtOperation::Add(item))?,
        "RemoveItem" => ctx.mutate(CrdtOperation::Remove(item))?,
        "GetCart" => {}
        other => anyhow::bail!("unknown command: {other}"),
    }
    let CrdtValue::OrSet(items) = ctx.value() else {
        anyhow::bail!("cart is not a set");
    };
    Ok(Bytes::from(items.len().to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let host = EntityHost::new(host_config!(env)?)?
        .add_entity(EntityDefinition::crdt("example.counter.Counter", CrdtKind::GCounter, counter))
        .add_entity(
            EntityDefinition::crdt("example.shoppingcart.ShoppingCart", CrdtKind::OrSet, cart)
                .persistence_id("carts"),
        )
        .start()
        .await?;

    let mut client = HostClient::connect(host.local_addr()).await?;
    let spec = client.discover(ProxyInfo::default()).await?;
    println!("{}", serde_json::to_string_pretty(&spec.entities)?);
    drop(client);

    tokio::signal::ctrl_c().await?;
    host.shutdown().await?;
    Ok(())
}
