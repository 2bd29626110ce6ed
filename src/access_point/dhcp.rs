//! Minimal DHCP server for the access point's own subnet.
//!
//! Hands out addresses from a small pool right after the player's address, with the
//! player as router and DNS server. Leases are kept per hardware address and never expire;
//! when the pool is full the slots are reclaimed in turn.
//!
//! [`DhcpServer`] only turns request bytes into reply bytes, so the packet handling runs
//! on the host too. The UDP loop lives with the radio bring-up.

/// Port the server listens on.
pub const SERVER_PORT: u16 = 67;
/// Port replies are sent to.
pub const CLIENT_PORT: u16 = 68;
/// Size of every reply, the BOOTP minimum.
pub const REPLY_BYTES: usize = 300;
/// Last octet of the first address handed out.
pub const POOL_START: u8 = 2;
/// Number of addresses handed out.
pub const POOL_SIZE: usize = 16;
/// Lease length advertised to clients.
pub const LEASE_SECONDS: u32 = 2 * 60 * 60;

const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
const OPTIONS_OFFSET: usize = 240;

const OPTION_PAD: u8 = 0;
const OPTION_SUBNET_MASK: u8 = 1;
const OPTION_ROUTER: u8 = 3;
const OPTION_DNS: u8 = 6;
const OPTION_REQUESTED_ADDRESS: u8 = 50;
const OPTION_LEASE_TIME: u8 = 51;
const OPTION_MESSAGE_TYPE: u8 = 53;
const OPTION_SERVER_ID: u8 = 54;
const OPTION_END: u8 = 255;

type HardwareAddress = [u8; 6];

/// DHCP message types the server sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplyKind {
    /// Answer to a discover.
    Offer,
    /// The requested address is confirmed.
    Ack,
    /// The requested address cannot be used.
    Nak,
}

impl ReplyKind {
    const fn code(self) -> u8 {
        match self {
            Self::Offer => 2,
            Self::Ack => 5,
            Self::Nak => 6,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Discover,
    Request,
    Release,
}

struct Request {
    kind: RequestKind,
    xid: [u8; 4],
    flags: [u8; 2],
    client_address: [u8; 4],
    hardware: HardwareAddress,
    requested: Option<[u8; 4]>,
    server_id: Option<[u8; 4]>,
}

/// Lease table plus the server's own address.
pub struct DhcpServer {
    address: [u8; 4],
    mask: [u8; 4],
    leases: [Option<HardwareAddress>; POOL_SIZE],
    next_reclaim: usize,
}

impl DhcpServer {
    /// Serve the subnet of `address`/`prefix_len`; `address` is also router and DNS.
    #[must_use]
    pub const fn new(address: [u8; 4], prefix_len: u8) -> Self {
        assert!(prefix_len >= 8 && prefix_len <= 24, "prefix length must be 8-24");
        assert!(
            (address[3] as usize) < POOL_START as usize
                || (address[3] as usize) >= POOL_START as usize + POOL_SIZE,
            "server address must lie outside the pool"
        );
        let mask = (u32::MAX << (32 - prefix_len)).to_be_bytes();
        Self {
            address,
            mask,
            leases: [None; POOL_SIZE],
            next_reclaim: 0,
        }
    }

    /// Address leased to `hardware`, if any.
    #[must_use]
    pub fn leased_to(&self, hardware: &[u8; 6]) -> Option<[u8; 4]> {
        self.leases
            .iter()
            .position(|lease| lease.as_ref() == Some(hardware))
            .map(|slot| self.pool_address(slot))
    }

    /// Handle one datagram from a client.
    ///
    /// Writes the reply into `reply` and returns its kind, or returns `None` when the
    /// datagram needs no answer (not a DHCP request, a release, or meant for another server).
    pub fn respond(&mut self, packet: &[u8], reply: &mut [u8; REPLY_BYTES]) -> Option<ReplyKind> {
        let request = parse(packet)?;
        let (kind, offered) = match request.kind {
            RequestKind::Discover => {
                let slot = self.slot_for(request.hardware);
                (ReplyKind::Offer, self.pool_address(slot))
            }
            RequestKind::Request => {
                if request.server_id.is_some_and(|id| id != self.address) {
                    debug!("DHCP: client chose another server");
                    self.release(request.hardware);
                    return None;
                }
                let wanted = request
                    .requested
                    .or((request.client_address != [0; 4]).then_some(request.client_address));
                match wanted.and_then(|address| self.claim(address, request.hardware)) {
                    Some(address) => (ReplyKind::Ack, address),
                    None => (ReplyKind::Nak, [0; 4]),
                }
            }
            RequestKind::Release => {
                self.release(request.hardware);
                return None;
            }
        };
        self.write_reply(&request, kind, offered, reply);
        debug!(
            "DHCP: {:?} {}.{}.{}.{}",
            kind, offered[0], offered[1], offered[2], offered[3]
        );
        Some(kind)
    }

    fn pool_address(&self, slot: usize) -> [u8; 4] {
        let [a, b, c, _] = self.address;
        [a, b, c, POOL_START + slot as u8]
    }

    fn pool_slot(&self, address: [u8; 4]) -> Option<usize> {
        if address[..3] != self.address[..3] {
            return None;
        }
        let slot = usize::from(address[3].checked_sub(POOL_START)?);
        (slot < POOL_SIZE).then_some(slot)
    }

    /// Existing lease, else a free slot, else the next slot to reclaim.
    fn slot_for(&mut self, hardware: HardwareAddress) -> usize {
        if let Some(slot) = self.leases.iter().position(|lease| *lease == Some(hardware)) {
            return slot;
        }
        let slot = match self.leases.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                let slot = self.next_reclaim;
                self.next_reclaim = (slot + 1) % POOL_SIZE;
                warn!("DHCP: pool full, reclaiming slot {}", slot);
                slot
            }
        };
        self.leases[slot] = Some(hardware);
        slot
    }

    fn claim(&mut self, address: [u8; 4], hardware: HardwareAddress) -> Option<[u8; 4]> {
        let slot = self.pool_slot(address)?;
        match self.leases[slot] {
            Some(holder) if holder != hardware => None,
            _ => {
                self.release(hardware);
                self.leases[slot] = Some(hardware);
                Some(address)
            }
        }
    }

    fn release(&mut self, hardware: HardwareAddress) {
        for lease in &mut self.leases {
            if *lease == Some(hardware) {
                *lease = None;
            }
        }
    }

    fn write_reply(
        &self,
        request: &Request,
        kind: ReplyKind,
        offered: [u8; 4],
        reply: &mut [u8; REPLY_BYTES],
    ) {
        reply.fill(0);
        reply[0] = 2; // BOOTREPLY
        reply[1] = 1; // Ethernet
        reply[2] = 6;
        reply[4..8].copy_from_slice(&request.xid);
        reply[10..12].copy_from_slice(&request.flags);
        reply[16..20].copy_from_slice(&offered);
        reply[20..24].copy_from_slice(&self.address);
        reply[28..34].copy_from_slice(&request.hardware);
        reply[236..240].copy_from_slice(&MAGIC_COOKIE);

        let mut options = OptionWriter {
            buffer: &mut reply[OPTIONS_OFFSET..],
            len: 0,
        };
        options.put(OPTION_MESSAGE_TYPE, &[kind.code()]);
        options.put(OPTION_SERVER_ID, &self.address);
        if kind != ReplyKind::Nak {
            options.put(OPTION_LEASE_TIME, &LEASE_SECONDS.to_be_bytes());
            options.put(OPTION_SUBNET_MASK, &self.mask);
            options.put(OPTION_ROUTER, &self.address);
            options.put(OPTION_DNS, &self.address);
        }
        options.put_end();
    }
}

fn parse(packet: &[u8]) -> Option<Request> {
    let header = packet.get(..OPTIONS_OFFSET)?;
    // BOOTREQUEST over Ethernet with 6-byte hardware addresses.
    if header[0] != 1 || header[1] != 1 || header[2] != 6 || header[236..240] != MAGIC_COOKIE {
        return None;
    }

    let mut kind = None;
    let mut requested = None;
    let mut server_id = None;
    let mut options = &packet[OPTIONS_OFFSET..];
    while let Some((&code, rest)) = options.split_first() {
        match code {
            OPTION_PAD => {
                options = rest;
                continue;
            }
            OPTION_END => break,
            _ => {}
        }
        let (&len, rest) = rest.split_first()?;
        let value = rest.get(..usize::from(len))?;
        match (code, value) {
            (OPTION_MESSAGE_TYPE, &[1]) => kind = Some(RequestKind::Discover),
            (OPTION_MESSAGE_TYPE, &[3]) => kind = Some(RequestKind::Request),
            // Decline and release both give the address back.
            (OPTION_MESSAGE_TYPE, &[4 | 7]) => kind = Some(RequestKind::Release),
            (OPTION_REQUESTED_ADDRESS, &[a, b, c, d]) => requested = Some([a, b, c, d]),
            (OPTION_SERVER_ID, &[a, b, c, d]) => server_id = Some([a, b, c, d]),
            _ => {}
        }
        options = &rest[usize::from(len)..];
    }

    let mut hardware = [0; 6];
    hardware.copy_from_slice(&header[28..34]);
    Some(Request {
        kind: kind?,
        xid: [header[4], header[5], header[6], header[7]],
        flags: [header[10], header[11]],
        client_address: [header[12], header[13], header[14], header[15]],
        hardware,
        requested,
        server_id,
    })
}

struct OptionWriter<'a> {
    buffer: &'a mut [u8],
    len: usize,
}

impl OptionWriter<'_> {
    fn put(&mut self, code: u8, value: &[u8]) {
        let end = self.len + 2 + value.len();
        self.buffer[self.len] = code;
        self.buffer[self.len + 1] = value.len() as u8;
        self.buffer[self.len + 2..end].copy_from_slice(value);
        self.len = end;
    }

    fn put_end(&mut self) {
        self.buffer[self.len] = OPTION_END;
        self.len += 1;
    }
}
