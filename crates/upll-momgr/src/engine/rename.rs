//! Rename indirection between UNC names and controller names.
//!
//! A RENAME row of a VTN holds the name one controller knows the VTN by. A
//! RENAME row of a vrouter holds both the controller VTN name and the
//! controller vrouter name. Absence of a row means the controller uses the
//! UNC name.
//!
//! Lookups are skipped entirely for records whose rename flags are clear.

use super::{bump, MoMgrImpl};
use crate::momgr::{read_main, MoMgr};
use crate::request::IpcReqRespHeader;
use crate::{UpllError, UpllResult};
use tracing::{debug, trace};
use upll_dal::{ConfigStore, DbSubOp, MatchOpts, UpdateOp};
use upll_types::{
    validate_name, Attr, ConfigKey, ConfigKeyVal, ConfigVal, DataType, KeyType, KeyVrt, KeyVtn,
    RecordFlags, RenameComponent, TableRole, ValRename, MAX_LEN_VNODE_NAME, MAX_LEN_VTN_NAME,
};

const MATCH_VALUE_ON_CTRLR: MatchOpts = MatchOpts {
    ctrlr: true,
    domain: true,
    value: true,
};

fn component_attr(val: &ValRename, component: RenameComponent) -> &Attr<String> {
    match component {
        RenameComponent::Vtn => &val.vtn_name,
        RenameComponent::Vnode => &val.vnode_name,
        RenameComponent::FlowList => &val.flowlist_name,
    }
}

fn component_attr_mut(val: &mut ValRename, component: RenameComponent) -> &mut Attr<String> {
    match component {
        RenameComponent::Vtn => &mut val.vtn_name,
        RenameComponent::Vnode => &mut val.vnode_name,
        RenameComponent::FlowList => &mut val.flowlist_name,
    }
}

fn set_renamed(flags: &mut RecordFlags, component: RenameComponent, renamed: bool) {
    match component {
        RenameComponent::Vtn => flags.vtn_renamed = renamed,
        RenameComponent::Vnode => flags.vnode_renamed = renamed,
        RenameComponent::FlowList => flags.flowlist_renamed = renamed,
    }
}

/// Reads the RENAME row of `key` for one controller, if any.
fn lookup(
    engine: &MoMgrImpl,
    store: &dyn ConfigStore,
    key: impl Into<ConfigKey>,
    ctrlr: &str,
    domain: &str,
    dt: DataType,
) -> UpllResult<Option<ConfigKeyVal>> {
    let pattern = ConfigKeyVal::new(key).on_ctrlr(ctrlr, domain);
    let rows = engine.absent_as_empty(store.read_config_db(
        &pattern,
        dt,
        &DbSubOp::read().with_matching(MatchOpts::ctrlr_domain()),
        TableRole::Rename,
    ))?;
    Ok(rows.into_iter().next())
}

/// Rewrites the UNC names in `ckv` to the names its controller knows.
pub(crate) fn get_renamed_controller_key(
    engine: &MoMgrImpl,
    store: &dyn ConfigStore,
    ckv: &mut ConfigKeyVal,
    dt: DataType,
) -> UpllResult<()> {
    let flags = ckv.flags();
    if !flags.any_renamed() {
        return Ok(());
    }
    let (Some(ctrlr), Some(domain)) = (
        ckv.user_data.ctrlr_id.clone(),
        ckv.user_data.domain_id.clone(),
    ) else {
        return Ok(());
    };

    if flags.vnode_renamed {
        if let (Some(vtn), Some(vnode)) = (ckv.key.vtn_name(), ckv.key.vnode_name()) {
            let row = lookup(engine, store, KeyVrt::new(vtn, vnode), &ctrlr, &domain, dt)?;
            if let Some(names) = row.as_ref().and_then(|r| r.rename_val()) {
                if let Some(v) = names.vtn_name.value() {
                    ckv.key.rename_component(RenameComponent::Vtn, v);
                }
                if let Some(v) = names.vnode_name.value() {
                    ckv.key.rename_component(RenameComponent::Vnode, v);
                }
                trace!(key = %ckv, "resolved controller vnode name");
                return Ok(());
            }
        }
    }
    if flags.vtn_renamed {
        if let Some(vtn) = ckv.key.vtn_name() {
            let row = lookup(engine, store, KeyVtn::new(vtn), &ctrlr, &domain, dt)?;
            let names = row.as_ref().and_then(|r| r.rename_val());
            if let Some(v) = names.and_then(|n| n.vtn_name.value()) {
                ckv.key.rename_component(RenameComponent::Vtn, v);
                trace!(key = %ckv, "resolved controller vtn name");
            }
        }
    }
    Ok(())
}

/// Rewrites the controller names in `ckv` back to UNC names.
pub(crate) fn get_renamed_unc_key(
    engine: &MoMgrImpl,
    store: &dyn ConfigStore,
    ckv: &mut ConfigKeyVal,
    dt: DataType,
) -> UpllResult<()> {
    let (Some(ctrlr), Some(domain)) = (
        ckv.user_data.ctrlr_id.clone(),
        ckv.user_data.domain_id.clone(),
    ) else {
        return Ok(());
    };

    if let (Some(vtn), Some(vnode)) = (ckv.key.vtn_name(), ckv.key.vnode_name()) {
        let pattern = ConfigKeyVal::with_val(
            ConfigKey::empty(KeyType::Vrt),
            ConfigVal::Rename(ValRename {
                vtn_name: Attr::Valid(vtn.to_string()),
                vnode_name: Attr::Valid(vnode.to_string()),
                ..ValRename::default()
            }),
        )
        .on_ctrlr(ctrlr.as_str(), domain.as_str());
        let rows = engine.absent_as_empty(store.read_config_db(
            &pattern,
            dt,
            &DbSubOp::read().with_matching(MATCH_VALUE_ON_CTRLR),
            TableRole::Rename,
        ))?;
        if let Some(row) = rows.into_iter().next() {
            if let (Some(unc_vtn), Some(unc_vnode)) = (row.key.vtn_name(), row.key.vnode_name()) {
                ckv.key.rename_component(RenameComponent::Vtn, unc_vtn);
                ckv.key.rename_component(RenameComponent::Vnode, unc_vnode);
                return Ok(());
            }
        }
    }

    if let Some(vtn) = ckv.key.vtn_name() {
        let pattern = ConfigKeyVal::with_val(
            ConfigKey::empty(KeyType::Vtn),
            ConfigVal::Rename(ValRename {
                vtn_name: Attr::Valid(vtn.to_string()),
                ..ValRename::default()
            }),
        )
        .on_ctrlr(ctrlr.as_str(), domain.as_str());
        let rows = engine.absent_as_empty(store.read_config_db(
            &pattern,
            dt,
            &DbSubOp::read().with_matching(MATCH_VALUE_ON_CTRLR),
            TableRole::Rename,
        ))?;
        if let Some(unc_vtn) = rows.first().and_then(|r| r.key.vtn_name()) {
            ckv.key.rename_component(RenameComponent::Vtn, unc_vtn);
        }
    }
    Ok(())
}

impl MoMgrImpl {
    /// Renames a VTN or vrouter in the request's plane.
    ///
    /// `ikey` carries the current key and a rename value holding the new
    /// name. The object and every descendant row embedding the name are
    /// rewritten. Each controller keeps the name it already knows through a
    /// RENAME row, which is dropped once the controller name equals the new
    /// UNC name.
    pub fn rename_mo(
        &self,
        req: &IpcReqRespHeader,
        ikey: &ConfigKeyVal,
        store: &mut dyn ConfigStore,
    ) -> UpllResult<()> {
        let kt = ikey.key_type();
        let mgr = self.manager(kt)?;
        let component = mgr
            .rename_component()
            .ok_or_else(|| UpllError::NotAllowedForThisKt(kt.to_string()))?;
        mgr.validate_message(req, ikey)?;
        let dt = req.datatype;

        let new_name = ikey
            .rename_val()
            .and_then(|r| component_attr(r, component).value())
            .ok_or_else(|| UpllError::bad_request("rename without a new name"))?
            .clone();
        let max_len = match component {
            RenameComponent::Vnode => MAX_LEN_VNODE_NAME,
            _ => MAX_LEN_VTN_NAME,
        };
        validate_name("new_name", &new_name, max_len)?;
        let old_name = ikey
            .key
            .component(component)
            .ok_or_else(|| UpllError::bad_request(format!("{} has no {:?} name", kt, component)))?
            .to_string();

        let existing = read_main(&*store, &ConfigKeyVal::new(ikey.key.clone()), dt)?;
        let mut new_key = ikey.key.clone();
        new_key.rename_component(component, &new_name);
        let target = ConfigKeyVal::new(new_key.clone());
        if self.exists(&*store, &target, dt, MatchOpts::none(), TableRole::Main)? {
            return Err(UpllError::InstanceExists(new_key.to_string()));
        }

        let mut alias = ValRename::default();
        *component_attr_mut(&mut alias, component) = Attr::Valid(new_name.clone());
        let alias_rows = self.absent_as_empty(store.read_config_db(
            &ConfigKeyVal::with_val(ConfigKey::empty(kt), ConfigVal::Rename(alias)),
            dt,
            &DbSubOp::read_multiple().with_matching(MatchOpts::value()),
            TableRole::Rename,
        ))?;
        if let Some(other) = alias_rows.iter().find(|r| r.key != ikey.key) {
            return Err(UpllError::semantic(format!(
                "{} is the controller name of {}",
                new_name, other
            )));
        }

        let pairs = match component {
            RenameComponent::Vtn => self.vtn_spans(&*store, dt, &old_name)?,
            _ => match (existing.ctrlr_id(), existing.domain_id()) {
                (Some(c), Some(d)) => vec![(c.to_string(), d.to_string())],
                _ => Vec::new(),
            },
        };
        for (ctrlr, domain) in &pairs {
            self.remap_controller_name(
                store,
                dt,
                &ikey.key,
                &new_key,
                component,
                &new_name,
                ctrlr,
                domain,
            )?;
        }
        let renamed = self.exists(
            &*store,
            &ConfigKeyVal::new(new_key.clone()),
            dt,
            MatchOpts::none(),
            TableRole::Rename,
        )?;

        self.update_renamed_value(store, dt, mgr, &existing, component, &new_name, renamed)?;
        for table in mgr.tables().iter().filter(|t| **t != TableRole::Rename) {
            let rows = self.absent_as_empty(store.read_config_db(
                &ConfigKeyVal::new(ikey.key.clone()),
                dt,
                &DbSubOp::read_multiple(),
                *table,
            ))?;
            for row in rows {
                self.rewrite_row(store, dt, *table, row, component, &new_name, renamed)?;
            }
        }

        bump(&self.counters.renames);
        debug!(from = %ikey.key, to = %new_key, dt = %dt, controllers = pairs.len(), "renamed");
        Ok(())
    }

    /// Moves one controller's RENAME row from the old key to the new key.
    #[allow(clippy::too_many_arguments)]
    fn remap_controller_name(
        &self,
        store: &mut dyn ConfigStore,
        dt: DataType,
        old_key: &ConfigKey,
        new_key: &ConfigKey,
        component: RenameComponent,
        new_name: &str,
        ctrlr: &str,
        domain: &str,
    ) -> UpllResult<()> {
        let current = lookup(self, &*store, old_key.clone(), ctrlr, domain, dt)?;
        let mut names = match &current {
            Some(row) => row.rename_val().cloned().unwrap_or_default(),
            None => self.controller_names(&*store, dt, old_key, ctrlr, domain)?,
        };
        if current.is_some() {
            store.update_config_db(
                &ConfigKeyVal::new(old_key.clone()).on_ctrlr(ctrlr, domain),
                dt,
                UpdateOp::Delete,
                &MatchOpts::ctrlr_domain(),
                TableRole::Rename,
            )?;
        }

        let ctrlr_name = component_attr(&names, component).value().cloned();
        if ctrlr_name.as_deref() == Some(new_name) {
            trace!(ctrlr = %ctrlr, name = %new_name, "controller name matches new name");
            return Ok(());
        }
        if ctrlr_name.is_none() {
            *component_attr_mut(&mut names, component) = Attr::Valid(
                old_key.component(component).unwrap_or_default().to_string(),
            );
        }
        let row = ConfigKeyVal::with_val(new_key.clone(), ConfigVal::Rename(names))
            .on_ctrlr(ctrlr, domain);
        store.update_config_db(&row, dt, UpdateOp::Create, &MatchOpts::none(), TableRole::Rename)?;
        Ok(())
    }

    /// Names the controller currently knows `key` by, before any rename row
    /// of `key` itself exists.
    fn controller_names(
        &self,
        store: &dyn ConfigStore,
        dt: DataType,
        key: &ConfigKey,
        ctrlr: &str,
        domain: &str,
    ) -> UpllResult<ValRename> {
        let mut names = ValRename::default();
        if let Some(vtn) = key.vtn_name() {
            let vtn_row = lookup(self, store, KeyVtn::new(vtn), ctrlr, domain, dt)?;
            let ctrlr_vtn = vtn_row
                .as_ref()
                .and_then(|r| r.rename_val())
                .and_then(|n| n.vtn_name.value().cloned())
                .unwrap_or_else(|| vtn.to_string());
            names.vtn_name = Attr::Valid(ctrlr_vtn);
        }
        if let Some(vnode) = key.vnode_name() {
            names.vnode_name = Attr::Valid(vnode.to_string());
        }
        Ok(names)
    }

    /// Rewrites every descendant row of `old_parent` whose key embeds the
    /// renamed component, deepest first.
    #[allow(clippy::too_many_arguments)]
    fn update_renamed_value(
        &self,
        store: &mut dyn ConfigStore,
        dt: DataType,
        mgr: &dyn MoMgr,
        old_parent: &ConfigKeyVal,
        component: RenameComponent,
        new_name: &str,
        renamed: bool,
    ) -> UpllResult<()> {
        for child_kt in mgr.child_key_types() {
            let child_mgr = self.manager(*child_kt)?;
            let pattern = child_mgr.get_child_config_key(Some(old_parent))?;
            let mains = self.absent_as_empty(store.read_config_db(
                &pattern,
                dt,
                &DbSubOp::read_multiple(),
                TableRole::Main,
            ))?;
            for child in &mains {
                self.update_renamed_value(
                    store,
                    dt,
                    child_mgr,
                    child,
                    component,
                    new_name,
                    renamed,
                )?;
            }
            for table in child_mgr.tables() {
                let rows = if *table == TableRole::Main {
                    mains.clone()
                } else {
                    self.absent_as_empty(store.read_config_db(
                        &pattern,
                        dt,
                        &DbSubOp::read_multiple(),
                        *table,
                    ))?
                };
                for row in rows {
                    self.rewrite_row(store, dt, *table, row, component, new_name, renamed)?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn rewrite_row(
        &self,
        store: &mut dyn ConfigStore,
        dt: DataType,
        table: TableRole,
        mut row: ConfigKeyVal,
        component: RenameComponent,
        new_name: &str,
        renamed: bool,
    ) -> UpllResult<()> {
        let matching = if table.is_per_controller() {
            MatchOpts::ctrlr_domain()
        } else {
            MatchOpts::none()
        };
        store.update_config_db(&row, dt, UpdateOp::Delete, &matching, table)?;
        row.key.rename_component(component, new_name);
        if table != TableRole::Rename {
            set_renamed(&mut row.user_data.flags, component, renamed);
        }
        store.update_config_db(&row, dt, UpdateOp::Create, &MatchOpts::none(), table)?;
        Ok(())
    }
}
