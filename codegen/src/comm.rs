//! Communication stack configuration files (`comm_<protocol>_can<N>.h/.c`).

use indoc::formatdoc;
use osy_core::hash::DEFINITION_HASH;
use osy_core::*;

use crate::datapool::DataPoolCodegen;
use crate::naming::*;
use crate::text::*;
use crate::{Codegen, CodegenError, Indent};

/// Bytes an ECeS message spends on its own header.
const ECES_OVERHEAD: u8 = 2;

/// Copy of a COM data pool whose signal elements are prefixed with the name
/// of their message, so element names stay unique across messages in the
/// generated code.
pub fn qualify_com_pool(pool: &DataPool, proto: &CanProtocol) -> DataPool {
    let mut out = pool.clone();

    for (ifc, container) in proto.containers.iter().enumerate() {
        for dir in [Direction::Tx, Direction::Rx] {
            let list_idx = CanProtocol::com_list_index(ifc, dir);
            let Some(list) = out.lists.get_mut(list_idx.get()) else {
                continue;
            };

            for msg in container.messages(dir) {
                for sig in &msg.signals {
                    if let Some(elem) = list.elements.get_mut(sig.element.element.get()) {
                        elem.name = format!("{}_{}", msg.name, elem.name);
                    }
                }
            }
        }
    }

    out
}

/// File name of the configuration of `kind` on zero-based `interface`.
pub fn comm_basename(kind: CanProtocolKind, interface: usize) -> String {
    format!("comm_{}_can{}", kind.tag(), interface + 1)
}

fn protocol_constant(kind: CanProtocolKind) -> &'static str {
    match kind {
        CanProtocolKind::Layer2 => "OSY_COM_PROTOCOL_LAYER2",
        CanProtocolKind::Eces => "OSY_COM_PROTOCOL_ECES",
        CanProtocolKind::Ecos => "OSY_COM_PROTOCOL_ECOS",
        CanProtocolKind::CanOpen => "OSY_COM_PROTOCOL_CANOPEN",
    }
}

fn trigger_constant(trigger: TxTrigger) -> &'static str {
    match trigger {
        TxTrigger::Cyclic => "OSY_COM_TX_TRIGGER_CYCLIC",
        TxTrigger::OnChange => "OSY_COM_TX_TRIGGER_ON_CHANGE",
        TxTrigger::OnEvent => "OSY_COM_TX_TRIGGER_ON_EVENT",
        TxTrigger::CanOpenType254 => "OSY_COM_TX_TRIGGER_CANOPEN_TYPE_254",
        TxTrigger::CanOpenType255 => "OSY_COM_TX_TRIGGER_CANOPEN_TYPE_255",
    }
}

fn byte_order_constant(order: ByteOrder) -> &'static str {
    match order {
        ByteOrder::Little => "OSY_COM_BYTE_ORDER_INTEL",
        ByteOrder::Big => "OSY_COM_BYTE_ORDER_MOTOROLA",
    }
}

fn dir_name(dir: Direction) -> &'static str {
    match dir {
        Direction::Tx => "Tx",
        Direction::Rx => "Rx",
    }
}

/// Counter gap an ECeS receiver tolerates before it reports lost frames.
pub fn eces_counter_gap(msg: &CanMessage) -> u32 {
    if msg.cycle_ms == 0 {
        return 0;
    }

    (msg.timeout_ms / msg.cycle_ms).saturating_sub(1)
}

/// Global protocol configuration record of one interface.
pub(crate) fn protocol_config_ident(kind: CanProtocolKind, interface: usize) -> String {
    format!("gt_{}_ProtocolConfiguration", comm_basename(kind, interface))
}

struct CommFiles<'a> {
    cg: &'a Codegen<'a>,
    proto: &'a CanProtocol,
    pool: &'a DataPool,
    container: &'a MessageContainer,
    interface: usize,
    basename: String,
    project_hash: u32,
}

impl<'n> Codegen<'n> {
    /// Generate the configuration of protocol `proto` on zero-based CAN
    /// `interface`.
    pub fn comm_files(
        &self,
        proto: ProtocolIndex,
        interface: usize,
    ) -> Result<SourcePair, CodegenError> {
        let protocol = self
            .node
            .protocol(proto)
            .ok_or_else(|| CodegenError::config(format!("Protocol {proto} does not exist.")))?;

        let container = protocol
            .containers
            .get(interface)
            .ok_or(CodegenError::Range("Interface", interface as u32))?;

        let source = self.node.datapool(protocol.datapool).ok_or_else(|| {
            CodegenError::config(format!(
                "Protocol `{}` references data pool {}, which does not exist.",
                protocol.kind.tag(),
                protocol.datapool
            ))
        })?;

        if protocol.kind == CanProtocolKind::Eces {
            if let Some(msg) = container
                .tx
                .iter()
                .chain(&container.rx)
                .find(|m| m.dlc < ECES_OVERHEAD)
            {
                return Err(CodegenError::config(format!(
                    "ECeS message `{}` has DLC {}, which leaves no room for the protocol header.",
                    msg.name, msg.dlc
                )));
            }
        }

        let mut h = DEFINITION_HASH.digest();
        protocol.hash_into(&mut h);
        source.hash_into(&mut h);
        h.update(&(interface as u32).to_le_bytes());
        h.update(&self.version.to_le_bytes());

        let pool = qualify_com_pool(source, protocol);
        let files = CommFiles {
            cg: self,
            proto: protocol,
            pool: &pool,
            container,
            interface,
            basename: comm_basename(protocol.kind, interface),
            project_hash: h.finalize(),
        };

        Ok(SourcePair {
            basename: files.basename.clone(),
            header: files.header(),
            source: files.source(),
        })
    }
}

impl<'a> CommFiles<'a> {
    fn upper(&self) -> String {
        self.basename.to_uppercase()
    }

    fn header(&self) -> String {
        let mut body = formatdoc! {"
            {defines}
            {project_id}
            ",
            defines = section("Defines"),
            project_id = project_id_define(&self.basename, self.project_hash),
        };

        for dir in [Direction::Tx, Direction::Rx] {
            let msgs = self.container.messages(dir);
            let d = dir_name(dir).to_uppercase();

            body += "\n";
            body += &format!(
                "#define {}_NUMBER_OF_{d}_MESSAGES ({}U)\n",
                self.upper(),
                msgs.len()
            );
            for (i, msg) in msgs.iter().enumerate() {
                body += &format!(
                    "#define {}_{d}_INDEX_{} ({i}U)\n",
                    self.upper(),
                    msg.name.to_uppercase()
                );
            }
        }

        body += "\n";
        body += &formatdoc! {"
            {globals}
            extern const T_osy_com_protocol_configuration {ident};
            ",
            globals = section("Global Variables"),
            ident = protocol_config_ident(self.proto.kind, self.interface),
        };

        let top = file_header(
            &format!("{}.h", self.basename),
            "openSYDE communication stack configuration",
            &format!(
                "Protocol `{}` on CAN{} for application `{}`.",
                self.proto.kind.tag(),
                self.interface + 1,
                self.cg.app().name
            ),
            &self.cg.opts.exporter,
        );

        header_file(
            &top,
            &self.basename,
            &[
                "stwtypes.h".into(),
                "osy_com_configuration.h".into(),
                format!("{}.h", self.pool.basename()),
            ],
            &body,
        )
    }

    fn source(&self) -> String {
        let mut body = formatdoc! {"
            {defines}
            {guard}

            {project_id}

            {module_globals}
            ",
            defines = section("Defines"),
            guard = version_guard(
                "OSY_COM_CONFIG_DEFINITION_VERSION",
                self.cg.version,
                self.project_hash
            ),
            project_id = project_id_macro(&self.basename, self.project_hash),
            module_globals = section("Module Global Variables"),
        };

        for dir in [Direction::Tx, Direction::Rx] {
            for msg in self.container.messages(dir) {
                body += &self.signal_table(dir, msg);
            }
        }

        for dir in [Direction::Tx, Direction::Rx] {
            body += &self.message_table(dir);
        }

        body += &section("Global Variables");
        body += "\n";
        body += &self.protocol_config();

        let top = file_header(
            &format!("{}.c", self.basename),
            "openSYDE communication stack configuration",
            &format!(
                "Protocol `{}` on CAN{} for application `{}`.",
                self.proto.kind.tag(),
                self.interface + 1,
                self.cg.app().name
            ),
            &self.cg.opts.exporter,
        );

        source_file(&top, &self.basename, &body)
    }

    fn signal_table_ident(dir: Direction, msg: &CanMessage) -> String {
        format!("mat_{}Signals{}", dir_name(dir), msg.name)
    }

    fn signal_table(&self, dir: Direction, msg: &CanMessage) -> String {
        if msg.signals.is_empty() {
            return String::new();
        }

        let list = CanProtocol::com_list_index(self.interface, dir);
        let entries = msg
            .signals
            .iter()
            .map(|sig| {
                let name = self
                    .pool
                    .element(ElementRef {
                        list,
                        element: sig.element.element,
                    })
                    .map_or("?", |e| e.name.as_str());

                format!(
                    "{{ {}, {}U, {}U, {}U }}, ///< {name}",
                    byte_order_constant(sig.byte_order),
                    sig.start_bit,
                    sig.bit_length,
                    sig.element.element.raw(),
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        formatdoc! {"
            static const T_osy_com_signal_definition {ident}[{n}] =
            {{
            {entries}
            }};

            ",
            ident = Self::signal_table_ident(dir, msg),
            n = msg.signals.len(),
            entries = entries.indent(3),
        }
    }

    fn dlc(&self, msg: &CanMessage) -> u8 {
        match self.proto.kind {
            CanProtocolKind::Eces => msg.dlc - ECES_OVERHEAD,
            _ => msg.dlc,
        }
    }

    fn message_table(&self, dir: Direction) -> String {
        let msgs = self.container.messages(dir);
        if msgs.is_empty() {
            return String::new();
        }

        let entries = msgs
            .iter()
            .map(|msg| {
                let mut fields = vec![
                    format!("0x{:X}U", msg.id),
                    format!("{}U", u8::from(msg.extended)),
                    format!("{}U", self.dlc(msg)),
                    trigger_constant(msg.trigger).to_string(),
                ];

                match dir {
                    Direction::Tx => {
                        if self.cg.version >= 3 {
                            fields.push(format!("{}U", msg.delay_ms));
                        }
                        fields.push(format!("{}U", msg.cycle_ms));
                    }
                    Direction::Rx => {
                        fields.push(format!("{}U", msg.cycle_ms));
                        fields.push(format!("{}U", msg.timeout_ms));
                        if self.cg.version >= 3 {
                            let gap = match self.proto.kind {
                                CanProtocolKind::Eces => eces_counter_gap(msg),
                                _ => 0,
                            };
                            fields.push(format!("{gap}U"));
                        }
                    }
                }

                fields.push(format!("{}U", msg.signals.len()));
                fields.push(if msg.signals.is_empty() {
                    "NULL".into()
                } else {
                    format!("&{}[0]", Self::signal_table_ident(dir, msg))
                });

                format!("{{ {} }}, ///< {}", fields.join(", "), msg.name)
            })
            .collect::<Vec<_>>()
            .join("\n");

        formatdoc! {"
            static const T_osy_com_message_definition mat_{d}Messages[{n}] =
            {{
            {entries}
            }};

            static T_osy_com_message_status mat_{d}MessageStatus[{n}];

            ",
            d = dir_name(dir),
            n = msgs.len(),
            entries = entries.indent(3),
        }
    }

    fn protocol_config(&self) -> String {
        let table = |dir: Direction, what: &str| {
            if self.container.messages(dir).is_empty() {
                "NULL".to_string()
            } else {
                format!("&mat_{}{what}[0]", dir_name(dir))
            }
        };

        let fields = [
            (format!("{}U", self.interface), "CAN channel"),
            (protocol_constant(self.proto.kind).into(), "protocol"),
            (format!("{}U", self.container.tx.len()), "number of Tx messages"),
            (table(Direction::Tx, "Messages"), "Tx messages"),
            (table(Direction::Tx, "MessageStatus"), "Tx message status"),
            (format!("{}U", self.container.rx.len()), "number of Rx messages"),
            (table(Direction::Rx, "Messages"), "Rx messages"),
            (table(Direction::Rx, "MessageStatus"), "Rx message status"),
            (
                format!("{}U", CanProtocol::com_list_index(self.interface, Direction::Tx)),
                "Tx list index",
            ),
            (
                format!("{}U", CanProtocol::com_list_index(self.interface, Direction::Rx)),
                "Rx list index",
            ),
            (format!("&{}", self.pool.descriptor_ident()), "data pool"),
            (
                format!("&gt_osy_com_driver_{}", self.proto.kind.tag()),
                "protocol driver",
            ),
        ];

        let last = fields.len() - 1;
        let fields = fields
            .iter()
            .enumerate()
            .map(|(i, (value, comment))| {
                let sep = if i == last { "" } else { "," };
                format!("{value}{sep} ///< {comment}")
            })
            .collect::<Vec<_>>()
            .join("\n");

        formatdoc! {"
            const T_osy_com_protocol_configuration {ident} =
            {{
            {fields}
            }};
            ",
            ident = protocol_config_ident(self.proto.kind, self.interface),
            fields = fields.indent(3),
        }
    }
}
