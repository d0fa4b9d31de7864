//! Deterministic demo data.
//!
//! RULE: Nothing here may call a platform RNG. Every draw flows through a
//! `DemoRng` stream seeded from (seed XOR stream index), so the same seed
//! always yields the same dataset and adding a stream never shifts the
//! others.

use crate::{
    clock::date_key,
    error::StatsResult,
    records::{NewChannelAlias, NewResponseRecord, NewSendRecord},
    store::StatsStore,
};
use chrono::{Days, NaiveDate};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Stable stream assignments. Append only: reordering changes every seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum DemoStream {
    Sends     = 0,
    Responses = 1,
    Aliases   = 2,
}

pub struct DemoRng {
    inner: Pcg64Mcg,
}

impl DemoRng {
    pub fn new(seed: u64, stream: DemoStream) -> Self {
        let derived_seed = seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll an integer in [lo, hi]. Returns `lo` when the range is empty.
    pub fn range(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo + 1) as u64;
        lo + (self.inner.next_u64() % span) as i64
    }

    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Binomial-ish share of `n`: round(n × rate), rate jittered ±50 %.
    pub fn share(&mut self, n: i64, rate: f64) -> i64 {
        let jitter = 0.5 + self.next_f64();
        ((n as f64) * rate * jitter).round().clamp(0.0, n as f64) as i64
    }
}

/// One outbound channel in the demo catalogue.
#[derive(Debug, Clone, Copy)]
struct DemoChannel {
    cuenta:        &'static str,
    funnel:        &'static str,
    tipo_via:      &'static str,
    identificador: &'static str,
    alias:         &'static str,
    actividades:   &'static [&'static str],
}

const LINKEDIN_ACTIVITIES: &[&str] = &["conexion", "mensaje", "seguimiento"];
const EMAIL_ACTIVITIES: &[&str] = &["email_inicial", "email_seguimiento"];

const CHANNELS: &[DemoChannel] = &[
    DemoChannel { cuenta: "acme",    funnel: "outbound-frio", tipo_via: "linkedin", identificador: "laura-martin",       alias: "Laura (LinkedIn)", actividades: LINKEDIN_ACTIVITIES },
    DemoChannel { cuenta: "acme",    funnel: "outbound-frio", tipo_via: "email",    identificador: "ventas@acme.io",     alias: "Buzón ventas",     actividades: EMAIL_ACTIVITIES },
    DemoChannel { cuenta: "globex",  funnel: "reactivacion",  tipo_via: "linkedin", identificador: "pablo-ruiz",         alias: "Pablo (LinkedIn)", actividades: LINKEDIN_ACTIVITIES },
    DemoChannel { cuenta: "globex",  funnel: "outbound-frio", tipo_via: "email",    identificador: "hola@globex.com",    alias: "",                 actividades: EMAIL_ACTIVITIES },
    DemoChannel { cuenta: "initech", funnel: "eventos",       tipo_via: "email",    identificador: "events@initech.dev", alias: "Eventos Initech",  actividades: EMAIL_ACTIVITIES },
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemoDataset {
    pub sends:     Vec<NewSendRecord>,
    pub responses: Vec<NewResponseRecord>,
    pub aliases:   Vec<NewChannelAlias>,
}

pub struct DemoGenerator {
    seed: u64,
    end:  NaiveDate,
    days: u32,
}

impl DemoGenerator {
    /// Data for the `days` calendar days ending at `end` inclusive.
    pub fn new(seed: u64, end: NaiveDate, days: u32) -> Self {
        Self { seed, end, days }
    }

    pub fn generate(&self) -> DemoDataset {
        let mut send_rng = DemoRng::new(self.seed, DemoStream::Sends);
        let mut resp_rng = DemoRng::new(self.seed, DemoStream::Responses);
        let mut alias_rng = DemoRng::new(self.seed, DemoStream::Aliases);
        let mut data = DemoDataset::default();

        for offset in (0..self.days).rev() {
            let Some(day) = self.end.checked_sub_days(Days::new(u64::from(offset))) else {
                continue;
            };
            let fecha = date_key(day);

            for channel in CHANNELS {
                // Roughly one idle day a week per channel.
                if send_rng.chance(0.15) {
                    continue;
                }
                let mut channel_sends = 0;
                for actividad in channel.actividades {
                    let enviados = send_rng.range(5, 40);
                    let hour = send_rng.range(8, 19);
                    let minute = send_rng.range(0, 59);
                    channel_sends += enviados;
                    data.sends.push(NewSendRecord {
                        fecha:             fecha.clone(),
                        cuenta:            channel.cuenta.to_string(),
                        funnel:            channel.funnel.to_string(),
                        tipo_via:          channel.tipo_via.to_string(),
                        identificador_via: channel.identificador.to_string(),
                        tipo_actividad:    actividad.to_string(),
                        enviados,
                        fallidos:          send_rng.share(enviados, 0.04),
                        limite_alcanzado:  i64::from(send_rng.chance(0.05)),
                        ultimo_envio:      Some(format!("{fecha} {hour:02}:{minute:02}:00")),
                    });
                }
                if let Some(response) = responses_for(&mut resp_rng, channel, &fecha, channel_sends) {
                    data.responses.push(response);
                }
            }
        }

        for channel in CHANNELS.iter().filter(|c| !c.alias.is_empty()) {
            data.aliases.push(NewChannelAlias {
                cuenta:        channel.cuenta.to_string(),
                tipo_via:      channel.tipo_via.to_string(),
                identificador: channel.identificador.to_string(),
                alias:         channel.alias.to_string(),
                activo:        !alias_rng.chance(0.1),
            });
        }
        data
    }
}

/// Split a day's replies into categories. Qualified and scheduled are
/// subsets of interested; the remaining categories partition the total.
fn responses_for(
    rng: &mut DemoRng,
    channel: &DemoChannel,
    fecha: &str,
    sends: i64,
) -> Option<NewResponseRecord> {
    let total = rng.share(sends, 0.10);
    if total == 0 {
        return None;
    }
    let respuestas_automaticas = rng.share(total, 0.2);
    let interesados = rng.share(total - respuestas_automaticas, 0.4);
    let no_interesados = rng.share(total - respuestas_automaticas - interesados, 0.6);
    let no_cualifica = rng.share(total - respuestas_automaticas - interesados - no_interesados, 0.5);
    let otros = total - respuestas_automaticas - interesados - no_interesados - no_cualifica;
    let cualificados = rng.share(interesados, 0.6);
    let agendados = rng.share(cualificados, 0.5);

    Some(NewResponseRecord {
        fecha: fecha.to_string(),
        cuenta: channel.cuenta.to_string(),
        funnel: channel.funnel.to_string(),
        tipo_via: channel.tipo_via.to_string(),
        identificador_via: channel.identificador.to_string(),
        total_respuestas: total,
        cualificados,
        interesados,
        no_interesados,
        agendados,
        no_cualifica,
        respuestas_automaticas,
        otros,
    })
}

/// Write a dataset through the store's upserts. Returns rows written.
pub async fn populate(store: &dyn StatsStore, data: &DemoDataset) -> StatsResult<usize> {
    for record in &data.sends {
        store.upsert_send(record).await?;
    }
    for record in &data.responses {
        store.upsert_response(record).await?;
    }
    for record in &data.aliases {
        store.upsert_alias(record).await?;
    }
    let written = data.sends.len() + data.responses.len() + data.aliases.len();
    log::info!(
        "demo data: {} sends, {} responses, {} aliases",
        data.sends.len(),
        data.responses.len(),
        data.aliases.len()
    );
    Ok(written)
}
