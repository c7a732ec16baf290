use log::info;
use smtpd_embedded::{Address, Connection, Envelope, Handler, MailResult, RcptResult};
use std::sync::Arc;

// Accepts every sender, recipients must be in one of the local domains
#[derive(Clone)]
pub struct LocalDomains {
    domains: Arc<Vec<String>>,
}

impl LocalDomains {
    // An empty domain list accepts recipients in any domain
    pub fn new(domains: Vec<String>) -> Self {
        let domains = domains.iter().map(|d| d.to_lowercase()).collect();
        Self {
            domains: Arc::new(domains),
        }
    }
}

impl Handler for LocalDomains {
    fn mail(&mut self, conn: &Connection, from: Address) -> MailResult {
        info!("({}) mail from {}", conn.remote_addr(), from);
        MailResult::Ok(Box::new(LocalEnvelope {
            domains: self.domains.clone(),
            from,
            to: Vec::new(),
        }))
    }
}

struct LocalEnvelope {
    domains: Arc<Vec<String>>,
    from: Address,
    to: Vec<Address>,
}

impl Envelope for LocalEnvelope {
    fn add_recipient(&mut self, rcpt: Address) -> RcptResult {
        let domain = rcpt.domain();
        if !self.domains.is_empty() && !self.domains.contains(&domain) {
            return RcptResult::Rejected(format!("relay to {} not permitted", domain));
        }
        info!("{} -> {} (recipient {})", self.from, rcpt, self.to.len() + 1);
        self.to.push(rcpt);
        RcptResult::Ok
    }
}
