use std::collections::BTreeMap;

use super::Value;

/// Field name to value map for one protocol layer.
pub type Layer = BTreeMap<String, Value>;

/// Layer holding capture metadata that is not part of the wire format:
/// ingress/egress interface and connection-tracking state.
pub const META_LAYER: &str = "META";

/// Transport protocols a packet can carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolTag {
    #[strum(serialize = "tcp")]
    Tcp,
    #[strum(serialize = "udp")]
    Udp,
    #[strum(serialize = "icmp")]
    Icmp,
}

impl ProtocolTag {
    /// Name of the layer holding this protocol's header fields.
    #[must_use]
    pub const fn layer(self) -> &'static str {
        match self {
            ProtocolTag::Tcp => "TCP",
            ProtocolTag::Udp => "UDP",
            ProtocolTag::Icmp => "ICMP",
        }
    }

    /// IP protocol number.
    #[must_use]
    pub const fn number(self) -> i64 {
        match self {
            ProtocolTag::Tcp => 6,
            ProtocolTag::Udp => 17,
            ProtocolTag::Icmp => 1,
        }
    }

    /// Whether the header carries `sport`/`dport` fields.
    #[must_use]
    pub const fn has_ports(self) -> bool {
        matches!(self, ProtocolTag::Tcp | ProtocolTag::Udp)
    }

    fn defaults(self) -> Layer {
        let fields: &[(&str, i64)] = match self {
            ProtocolTag::Tcp => &[
                ("sport", 20),
                ("dport", 80),
                ("seq", 0),
                ("ack", 0),
                ("flags", 2),
                ("window", 8192),
            ],
            ProtocolTag::Udp => &[("sport", 53), ("dport", 53)],
            ProtocolTag::Icmp => &[("type", 8), ("code", 0)],
        };
        fields
            .iter()
            .map(|&(k, v)| (k.to_owned(), Value::Int(v)))
            .collect()
    }
}

/// A captured packet as a set of named layers.
///
/// Fields are addressed with `"<LAYER>.<field>"` paths such as `"IP.src"` or
/// `"TCP.dport"`. Layers are `Ether` (link), `IP` (internet), the transport
/// layer named by [`ProtocolTag::layer`], and [`META_LAYER`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    layers: BTreeMap<String, Layer>,
}

impl Packet {
    /// Create a packet of the given protocol with default header values.
    #[must_use]
    pub fn new(protocol: ProtocolTag) -> Self {
        Self::create(protocol, Layer::new(), Layer::new(), Layer::new())
    }

    /// Create a packet from link, internet and transport field maps. Given
    /// fields override the protocol defaults.
    #[must_use]
    pub fn create(protocol: ProtocolTag, link: Layer, internet: Layer, transport: Layer) -> Self {
        let mut ether = Layer::new();
        ether.insert("type".to_owned(), Value::Int(0x0800));
        ether.extend(link);

        let mut ip = Layer::new();
        ip.insert("version".to_owned(), Value::Int(4));
        ip.insert("ttl".to_owned(), Value::Int(64));
        ip.insert("proto".to_owned(), Value::Int(protocol.number()));
        ip.extend(internet);

        let mut l4 = protocol.defaults();
        l4.extend(transport);

        let mut layers = BTreeMap::new();
        layers.insert("Ether".to_owned(), ether);
        layers.insert("IP".to_owned(), ip);
        layers.insert(protocol.layer().to_owned(), l4);
        Self { layers }
    }

    /// Set a field at a `LAYER.field` path, creating the layer if needed.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value.into());
        self
    }

    /// Insert a field (mutable reference version). Paths without a `.` are ignored.
    pub fn insert(&mut self, path: &str, value: Value) {
        if let Some((layer, field)) = path.split_once('.') {
            self.layers
                .entry(layer.to_owned())
                .or_default()
                .insert(field.to_owned(), value);
        }
    }

    /// Look up a field by `LAYER.field` path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let (layer, field) = path.split_once('.')?;
        self.layers.get(layer)?.get(field)
    }

    /// The transport protocol, judged by which transport layer is present.
    #[must_use]
    pub fn get_type(&self) -> Option<ProtocolTag> {
        [ProtocolTag::Tcp, ProtocolTag::Udp, ProtocolTag::Icmp]
            .into_iter()
            .find(|p| self.layers.contains_key(p.layer()))
    }

    /// Every layer with its fields, in layer-name order.
    pub fn layers(&self) -> impl Iterator<Item = (&str, &Layer)> {
        self.layers.iter().map(|(k, v)| (k.as_str(), v))
    }
}
