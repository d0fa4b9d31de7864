//! Hierarchy reducer: account → channel identifier → activity.
//!
//! RULES:
//!   - `Hierarchy::build` is pure: it owns the tree it folds into and
//!     returns it. Nothing is shared between calls.
//!   - Parent totals are only ever added to, never overwritten, so every
//!     parent equals the sum of its children.
//!   - `enviados_hoy` is rolled up in a separate pass after all daily rows
//!     are folded.

use crate::{
    rates::Rates,
    records::{AggregateRow, DailyRow},
    types::{AccountName, ActivityType, ChannelId, DateKey},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters summed at the identifier and account levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub enviados:   i64,
    pub fallidos:   i64,
    pub respuestas: i64,
    pub agendados:  i64,
    pub limites:    i64,
}

impl Totals {
    fn add(&mut self, other: &Totals) {
        self.enviados += other.enviados;
        self.fallidos += other.fallidos;
        self.respuestas += other.respuestas;
        self.agendados += other.agendados;
        self.limites += other.limites;
    }

    pub fn rates(&self) -> Rates {
        Rates::from_counts(self.enviados, self.fallidos, self.respuestas, self.agendados)
    }
}

/// One day of one activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub fecha:      DateKey,
    pub enviados:   i64,
    pub fallidos:   i64,
    pub respuestas: i64,
    pub agendados:  i64,
    pub limites:    i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityNode {
    pub tipo_actividad:         ActivityType,
    pub funnel:                 String,
    pub enviados:               i64,
    pub fallidos:               i64,
    pub respuestas:             i64,
    pub cualificados:           i64,
    pub interesados:            i64,
    pub no_interesados:         i64,
    pub agendados:              i64,
    pub no_cualifica:           i64,
    pub respuestas_automaticas: i64,
    pub otros:                  i64,
    pub limites:                i64,
    pub dias_activos:           i64,
    pub ultimo_envio:           Option<String>,
    #[serde(flatten)]
    pub rates:                  Rates,
    pub datos_diarios:          Vec<DailyPoint>,
    pub enviados_hoy:           i64,
}

impl ActivityNode {
    fn from_row(row: &AggregateRow) -> Self {
        Self {
            tipo_actividad:         row.tipo_actividad.clone(),
            funnel:                 row.funnel.clone(),
            enviados:               row.total_enviados,
            fallidos:               row.total_fallidos,
            respuestas:             row.total_respuestas,
            cualificados:           row.total_cualificados,
            interesados:            row.total_interesados,
            no_interesados:         row.total_no_interesados,
            agendados:              row.total_agendados,
            no_cualifica:           row.total_no_cualifica,
            respuestas_automaticas: row.total_respuestas_automaticas,
            otros:                  row.total_otros,
            limites:                row.total_limites,
            dias_activos:           row.dias_activos,
            ultimo_envio:           row.ultimo_envio.clone(),
            rates:                  row.rates(),
            datos_diarios:          Vec::new(),
            enviados_hoy:           0,
        }
    }

    /// Fold a second aggregate row with the same activity key into this node.
    ///
    /// The SQL groups by funnel and channel type as well, so one activity
    /// type can arrive more than once under an identifier; counts are summed
    /// so the node still equals what its parents were credited with.
    fn merge(&mut self, row: &AggregateRow) {
        self.enviados += row.total_enviados;
        self.fallidos += row.total_fallidos;
        self.respuestas += row.total_respuestas;
        self.cualificados += row.total_cualificados;
        self.interesados += row.total_interesados;
        self.no_interesados += row.total_no_interesados;
        self.agendados += row.total_agendados;
        self.no_cualifica += row.total_no_cualifica;
        self.respuestas_automaticas += row.total_respuestas_automaticas;
        self.otros += row.total_otros;
        self.limites += row.total_limites;
        self.dias_activos = self.dias_activos.max(row.dias_activos);
        self.ultimo_envio = self.ultimo_envio.take().max(row.ultimo_envio.clone());
        self.rates = Rates::from_counts(self.enviados, self.fallidos, self.respuestas, self.agendados);
    }

    pub fn totals(&self) -> Totals {
        Totals {
            enviados:   self.enviados,
            fallidos:   self.fallidos,
            respuestas: self.respuestas,
            agendados:  self.agendados,
            limites:    self.limites,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierNode {
    pub identificador: ChannelId,
    pub tipo_via:      String,
    pub totales:       Totals,
    pub actividades:   BTreeMap<ActivityType, ActivityNode>,
    pub enviados_hoy:  i64,
    #[serde(flatten)]
    pub rates:         Rates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountNode {
    pub nombre:          AccountName,
    pub totales:         Totals,
    pub identificadores: BTreeMap<ChannelId, IdentifierNode>,
    pub enviados_hoy:    i64,
    #[serde(flatten)]
    pub rates:           Rates,
}

/// Grand totals across every account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTotals {
    pub enviados:     i64,
    pub fallidos:     i64,
    pub respuestas:   i64,
    pub agendados:    i64,
    pub limites:      i64,
    pub enviados_hoy: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hierarchy {
    pub cuentas: BTreeMap<AccountName, AccountNode>,
}

impl Hierarchy {
    /// Build the tree from the aggregate and daily result sets.
    ///
    /// `today` is compared by exact string equality with each daily row's
    /// `fecha`.
    pub fn build(aggregates: &[AggregateRow], daily: &[DailyRow], today: &str) -> Self {
        let tree = aggregates.iter().fold(Self::default(), Self::with_aggregate);
        let tree = daily
            .iter()
            .fold(tree, |tree, row| tree.with_daily(row, today));
        tree.finalized()
    }

    fn with_aggregate(mut self, row: &AggregateRow) -> Self {
        let account = self
            .cuentas
            .entry(row.cuenta.clone())
            .or_insert_with(|| AccountNode {
                nombre:          row.cuenta.clone(),
                totales:         Totals::default(),
                identificadores: BTreeMap::new(),
                enviados_hoy:    0,
                rates:           Rates::default(),
            });
        let identifier = account
            .identificadores
            .entry(row.identificador_via.clone())
            .or_insert_with(|| IdentifierNode {
                identificador: row.identificador_via.clone(),
                tipo_via:      row.tipo_via.clone(),
                totales:       Totals::default(),
                actividades:   BTreeMap::new(),
                enviados_hoy:  0,
                rates:         Rates::default(),
            });

        let contribution = match identifier.actividades.get_mut(&row.tipo_actividad) {
            Some(existing) => {
                log::debug!(
                    "merging duplicate activity {}/{}/{} (funnel {})",
                    row.cuenta,
                    row.identificador_via,
                    row.tipo_actividad,
                    row.funnel
                );
                existing.merge(row);
                ActivityNode::from_row(row).totals()
            }
            None => {
                let node = ActivityNode::from_row(row);
                let totals = node.totals();
                identifier.actividades.insert(row.tipo_actividad.clone(), node);
                totals
            }
        };

        identifier.totales.add(&contribution);
        account.totales.add(&contribution);
        self
    }

    fn with_daily(mut self, row: &DailyRow, today: &str) -> Self {
        let activity = self
            .cuentas
            .get_mut(&row.cuenta)
            .and_then(|a| a.identificadores.get_mut(&row.identificador_via))
            .and_then(|i| i.actividades.get_mut(&row.tipo_actividad));

        let Some(activity) = activity else {
            log::debug!(
                "daily row without aggregate: {}/{}/{} on {}",
                row.cuenta,
                row.identificador_via,
                row.tipo_actividad,
                row.fecha
            );
            return self;
        };

        activity.datos_diarios.push(DailyPoint {
            fecha:      row.fecha.clone(),
            enviados:   row.enviados_dia,
            fallidos:   row.fallidos_dia,
            respuestas: row.respuestas_dia,
            agendados:  row.agendados_dia,
            limites:    row.limites_dia,
        });
        if row.fecha == today {
            activity.enviados_hoy += row.enviados_dia;
        }
        self
    }

    /// Roll `enviados_hoy` upward and compute the rollup rates.
    fn finalized(mut self) -> Self {
        for account in self.cuentas.values_mut() {
            account.enviados_hoy = 0;
            for identifier in account.identificadores.values_mut() {
                identifier.enviados_hoy = identifier
                    .actividades
                    .values()
                    .map(|a| a.enviados_hoy)
                    .sum();
                identifier.rates = identifier.totales.rates();
                account.enviados_hoy += identifier.enviados_hoy;
            }
            account.rates = account.totales.rates();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cuentas.is_empty()
    }

    pub fn account(&self, name: &str) -> Option<&AccountNode> {
        self.cuentas.get(name)
    }

    pub fn global_totals(&self) -> GlobalTotals {
        self.cuentas
            .values()
            .fold(GlobalTotals::default(), |acc, account| GlobalTotals {
                enviados:     acc.enviados + account.totales.enviados,
                fallidos:     acc.fallidos + account.totales.fallidos,
                respuestas:   acc.respuestas + account.totales.respuestas,
                agendados:    acc.agendados + account.totales.agendados,
                limites:      acc.limites + account.totales.limites,
                enviados_hoy: acc.enviados_hoy + account.enviados_hoy,
            })
    }
}
