//! Network call handlers

use serde_json::json;

use super::domain::{resolved_host, Endpoint};
use crate::pipeline::{BuildContext, DispatchTable, Invocation, PipelineResult};
use crate::shared::models::{EdgeKind, VertexData};
use crate::shared::utils::CallArgs;

const ADDRESS: &[&str] = &["ip_address", "ip", "address", "name", "sockaddr"];
const PORT: &[&str] = &["port", "Port", "dst_port"];
const HOSTNAME: &[&str] = &["hostname", "NodeName", "pNodeName", "pName", "lpstrName", "Name", "name"];

pub(crate) fn register(dispatch: &DispatchTable) {
    dispatch.register(["connect", "WSAConnect", "ConnectEx"], connect);
    dispatch.register(
        [
            "getaddrinfo",
            "GetAddrInfoW",
            "GetAddrInfoExW",
            "gethostbyname",
            "DnsQuery_A",
            "DnsQuery_W",
            "DnsQuery_UTF8",
        ],
        resolve_host,
    );
}

/// Non-blocking sockets report a failing `connect`, so status is ignored
fn connect(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    let raw = inv
        .record
        .arg_str(ADDRESS)
        .ok_or_else(|| inv.unusable("no remote address"))?;
    let endpoint = Endpoint::parse(&raw, inv.record.arg_int(PORT))
        .ok_or_else(|| inv.unusable("empty remote address"))?;

    let host = ctx.add(VertexData::Host(endpoint.to_host_data()))?;
    let attrs = endpoint.port.map(|port| ("port", json!(port)));
    ctx.link_with(EdgeKind::ConnectsTo, inv.call, host, attrs)?;
    Ok(())
}

fn resolve_host(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let name = inv
        .record
        .arg_str(HOSTNAME)
        .ok_or_else(|| inv.unusable("no host name"))?;
    let data = resolved_host(&name).ok_or_else(|| inv.unusable("empty host name"))?;
    let host = ctx.add(VertexData::Host(data))?;
    ctx.link(EdgeKind::ResolvesHost, inv.call, host)?;
    Ok(())
}
