//! Strategy list compiler

use super::expand::{self, MAX_RAW_STRATEGIES};
use super::{IpVersion, ParameterGroup, Protocol, Strategy, StrategySet, SubstitutionTable};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

const PROTO_TAG: &str = "#PROTO=";
const IPV_TAG: &str = "#IPV=";
const PROXY_TAG: &str = "#PROXY=";
const KEY_TAG: &str = "#KEY#";
const END_GROUP_TAG: &str = "#ENDGROUP#";

/// Compile a strategy list.
///
/// Lines that are empty or start with `/` are comments. Each `#ENDGROUP#`
/// expands the groups declared since the previous one; the batches are
/// concatenated. A strategy whose token set (ignoring order) equals an
/// earlier one is dropped, across batches too.
pub fn compile(source: &str, table: &SubstitutionTable) -> Result<StrategySet> {
    let mut ctx = CompileContext::new(table);

    for (idx, line) in source.lines().enumerate() {
        ctx.feed(idx + 1, line)?;
    }

    ctx.finish()
}

/// Read and compile a strategy list file
pub fn compile_file<P: AsRef<Path>>(path: P, table: &SubstitutionTable) -> Result<StrategySet> {
    let path = path.as_ref();
    info!(path = %path.display(), "Reading strategy list");
    let source = std::fs::read_to_string(path)?;
    compile(&source, table)
}

/// Mutable state of one compilation
struct CompileContext<'a> {
    table: &'a SubstitutionTable,
    protocol: Option<Protocol>,
    ip_version: Option<IpVersion>,
    /// Outer `None` means not declared yet
    proxy: Option<Option<String>>,
    groups: Vec<ParameterGroup>,
    strategies: Vec<Strategy>,
    signatures: HashSet<Vec<String>>,
}

impl<'a> CompileContext<'a> {
    fn new(table: &'a SubstitutionTable) -> Self {
        Self {
            table,
            protocol: None,
            ip_version: None,
            proxy: None,
            groups: Vec::new(),
            strategies: Vec::new(),
            signatures: HashSet::new(),
        }
    }

    fn feed(&mut self, line_no: usize, line: &str) -> Result<()> {
        if line.is_empty() || line.starts_with('/') {
            return Ok(());
        }
        debug!(line = line_no, "Reading line: {}", line);

        if line.contains(PROTO_TAG) {
            self.parse_protocol(line_no, line)
        } else if line.contains(IPV_TAG) {
            self.parse_ip_version(line_no, line)
        } else if line.contains(PROXY_TAG) {
            self.parse_proxy(line_no, line)
        } else if line.contains(KEY_TAG) {
            self.parse_group(line_no, line)
        } else if line.contains(END_GROUP_TAG) {
            self.end_group(line_no)
        } else {
            Err(Error::compile(line_no, format!("unexpected content '{line}'")))
        }
    }

    fn parse_protocol(&mut self, line_no: usize, line: &str) -> Result<()> {
        if self.protocol.is_some() {
            return Err(Error::compile(line_no, "protocol was already set"));
        }
        let protocol = match scalar_value(line) {
            "TCP" => Protocol::Tcp,
            "UDP" => Protocol::Udp,
            "" => return Err(Error::compile(line_no, "protocol can't be empty")),
            other => {
                return Err(Error::compile(
                    line_no,
                    format!("protocol '{other}' is incorrect: expected TCP or UDP"),
                ))
            }
        };
        debug!(%protocol, "Found protocol");
        self.protocol = Some(protocol);
        Ok(())
    }

    fn parse_ip_version(&mut self, line_no: usize, line: &str) -> Result<()> {
        if self.ip_version.is_some() {
            return Err(Error::compile(line_no, "IP version was already set"));
        }
        let version = match scalar_value(line) {
            "" => {
                info!("IP version is empty, assuming IPv4");
                IpVersion::V4
            }
            "4" => IpVersion::V4,
            "6" => IpVersion::V6,
            other => {
                return Err(Error::compile(
                    line_no,
                    format!("IP version '{other}' is incorrect: expected 4 or 6"),
                ))
            }
        };
        self.ip_version = Some(version);
        Ok(())
    }

    fn parse_proxy(&mut self, line_no: usize, line: &str) -> Result<()> {
        if self.proxy.is_some() {
            return Err(Error::compile(line_no, "proxy was already set"));
        }
        let proxy = match scalar_value(line) {
            "" => {
                info!("Proxy is empty, assuming no proxy");
                None
            }
            address => Some(address.to_string()),
        };
        self.proxy = Some(proxy);
        Ok(())
    }

    fn parse_group(&mut self, line_no: usize, line: &str) -> Result<()> {
        let (name, list) = group_fields(line);
        let alternatives: Vec<String> = list
            .split(';')
            .filter(|alt| !alt.is_empty())
            .map(str::to_string)
            .collect();

        if alternatives.is_empty() {
            return Err(Error::compile(line_no, "parameter group has no tokens"));
        }

        debug!(line = line_no, ?name, ?alternatives, "Parameter group found");
        self.groups.push(ParameterGroup {
            name: name.map(str::to_string),
            alternatives,
        });
        Ok(())
    }

    fn end_group(&mut self, line_no: usize) -> Result<()> {
        if self.groups.is_empty() {
            return Err(Error::compile(
                line_no,
                "no parameter groups before '#ENDGROUP#', use '#KEY#' to declare them",
            ));
        }

        let total = expand::raw_count(&self.groups)
            .filter(|total| *total <= MAX_RAW_STRATEGIES)
            .ok_or_else(|| {
                Error::compile(
                    line_no,
                    format!("group sizes produce more than {MAX_RAW_STRATEGIES} combinations"),
                )
            })?;

        let groups = std::mem::take(&mut self.groups);
        let raw = expand::expand(&groups, total)?;
        let before = self.strategies.len();

        for raw_tokens in &raw {
            let tokens = expand::normalize(raw_tokens, self.table);
            if tokens.is_empty() {
                debug!(?raw_tokens, "Dropping strategy with no tokens");
                continue;
            }
            if !self.signatures.insert(expand::signature(&tokens)) {
                debug!(?tokens, "Dropping duplicate strategy");
                continue;
            }
            debug!(index = self.strategies.len() + 1, ?tokens, "Formed strategy");
            self.strategies.push(Strategy::new(tokens));
        }

        info!(
            line = line_no,
            combinations = total,
            kept = self.strategies.len() - before,
            "Group batch expanded"
        );
        Ok(())
    }

    fn finish(self) -> Result<StrategySet> {
        let protocol = self.protocol.ok_or_else(|| {
            Error::Configuration("protocol is undefined; use '#PROTO=' to set it".into())
        })?;
        let ip_version = self.ip_version.unwrap_or_else(|| {
            info!("IP version is undefined, assuming IPv4");
            IpVersion::V4
        });
        let proxy = self.proxy.unwrap_or_else(|| {
            info!("Proxy is undefined, assuming no proxy");
            None
        });

        if !self.groups.is_empty() {
            warn!(
                groups = self.groups.len(),
                "Parameter groups without a closing '#ENDGROUP#' were ignored"
            );
        }
        if self.strategies.is_empty() {
            return Err(Error::Configuration("no strategies found".into()));
        }

        info!(total = self.strategies.len(), "Strategies formed from the list");
        Ok(StrategySet {
            protocol,
            ip_version,
            proxy,
            strategies: self.strategies,
        })
    }
}

/// Text between the first and second `=`
fn scalar_value(line: &str) -> &str {
    line.split('=').nth(1).unwrap_or("").trim()
}

/// Split a `#KEY#` line into its optional name and token list.
///
/// Accepts `#KEY#tokens#` and `#KEY#name#tokens#`.
fn group_fields(line: &str) -> (Option<&str>, &str) {
    let rest = line
        .find(KEY_TAG)
        .map_or("", |pos| &line[pos + KEY_TAG.len()..]);
    let fields: Vec<&str> = rest.split('#').collect();

    match fields.as_slice() {
        [name, list, ..] if !list.is_empty() && fields.len() >= 3 => (Some(*name), *list),
        [list, ..] => (None, *list),
        [] => (None, ""),
    }
}
