use once_cell::sync::Lazy;
use std::collections::HashMap;

// Known WHOIS servers for popular suffixes; anything else goes through discovery.
const KNOWN_WHOIS_SERVERS: &[(&str, &str)] = &[
    // Generic TLDs
    ("com", "whois.verisign-grs.com"),
    ("net", "whois.verisign-grs.com"),
    ("org", "whois.pir.org"),
    ("info", "whois.afilias.net"),
    ("biz", "whois.neulevel.biz"),
    ("name", "whois.nic.name"),
    ("pro", "whois.registrypro.pro"),
    ("xyz", "whois.nic.xyz"),
    ("top", "whois.nic.top"),
    ("shop", "whois.nic.shop"),
    ("online", "whois.nic.online"),
    ("store", "whois.nic.store"),
    ("site", "whois.nic.site"),
    ("app", "whois.nic.google"),
    ("dev", "whois.nic.google"),
    ("tech", "whois.nic.tech"),
    ("blog", "whois.nic.blog"),
    ("club", "whois.nic.club"),
    ("live", "whois.nic.live"),
    ("io", "whois.nic.io"),
    ("ai", "whois.nic.ai"),
    // Europe
    ("uk", "whois.nic.uk"),
    ("co.uk", "whois.nic.uk"),
    ("org.uk", "whois.nic.uk"),
    ("me.uk", "whois.nic.uk"),
    ("gov.uk", "whois.nic.uk"),
    ("de", "whois.denic.de"),
    ("fr", "whois.afnic.fr"),
    ("it", "whois.nic.it"),
    ("es", "whois.nic.es"),
    ("nl", "whois.domain-registry.nl"),
    ("be", "whois.dns.be"),
    ("ch", "whois.nic.ch"),
    ("at", "whois.nic.at"),
    ("se", "whois.iis.se"),
    ("no", "whois.norid.no"),
    ("dk", "whois.dk-hostmaster.dk"),
    ("fi", "whois.fi"),
    ("pl", "whois.dns.pl"),
    ("cz", "whois.nic.cz"),
    ("eu", "whois.eu"),
    ("ie", "whois.weare.ie"),
    // Asia-Pacific
    ("jp", "whois.jprs.jp"),
    ("co.jp", "whois.jprs.jp"),
    ("kr", "whois.kr"),
    ("cn", "whois.cnnic.cn"),
    ("com.cn", "whois.cnnic.cn"),
    ("hk", "whois.hkirc.hk"),
    ("sg", "whois.sgnic.sg"),
    ("in", "whois.registry.in"),
    ("co.in", "whois.registry.in"),
    ("au", "whois.auda.org.au"),
    ("com.au", "whois.auda.org.au"),
    ("nz", "whois.srs.net.nz"),
    ("co.nz", "whois.srs.net.nz"),
    // Americas
    ("ca", "whois.cira.ca"),
    ("us", "whois.nic.us"),
    ("mx", "whois.mx"),
    ("br", "whois.registro.br"),
    ("com.br", "whois.registro.br"),
    ("co", "whois.nic.co"),
    // Elsewhere
    ("ru", "whois.tcinet.ru"),
    ("za", "whois.registry.net.za"),
    ("co.za", "whois.registry.net.za"),
];

pub static HARDCODED_TLD_SERVERS: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| KNOWN_WHOIS_SERVERS.iter().copied().collect());

pub fn known_whois_server(suffix: &str) -> Option<&'static str> {
    HARDCODED_TLD_SERVERS.get(suffix).copied()
}
