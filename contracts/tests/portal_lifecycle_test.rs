//! Integration test for the full portal lifecycle.
//!
//! One owner accumulates tranches through deposits paid by a third party,
//! donations keep moving the exchange rate, an approved operator withdraws
//! and redeems on the owner's behalf, the owner delegates, and after the
//! cliff every tranche is transformed and every free share redeemed.

use portal_contracts::{ErrorKind, Portal, TrancheId};
use portal_protocol::asset::{BaseAsset, VotingToken};
use portal_protocol::config::PortalConfig;
use portal_protocol::identity::Address;

const OFFSET: u64 = 1_000_000;

struct World {
    portal: Portal<VotingToken>,
    root: Address,
    other: Address,
    owner: Address,
    cliff: u64,
}

fn world() -> World {
    let root = Address::from_label("root");
    let other = Address::from_label("other");
    let owner = Address::from_label("owner");

    let mut token = VotingToken::new("Nofee", "NOFEE", 18);
    token.mint(root, 10_000_000_000).unwrap();

    let cliff = 100;
    let config = PortalConfig::new(cliff, token.address());
    let portal = Portal::new(config, token).unwrap();

    World {
        portal,
        root,
        other,
        owner,
        cliff,
    }
}

/// The vault's held balance equals its untrusted assets.
fn assert_vault_custody(portal: &Portal<VotingToken>) {
    let vault = portal.vault();
    assert_eq!(
        vault.asset().balance_of(&vault.address()),
        vault.total_assets() - vault.total_trusted()
    );
}

/// `root` funds `other`, who deposits through the portal into a tranche
/// owned by `owner`.
fn fund_and_deposit(w: &mut World, assets: u64) -> (TrancheId, u64) {
    let (root, other, owner) = (w.root, w.other, w.owner);
    let pool = w.portal.address();
    w.portal.mine(1).unwrap();

    let expected = w.portal.preview_deposit(assets).unwrap();
    let expected_id = TrancheId::new(
        w.portal.height(),
        w.portal.vault().total_assets(),
        w.portal.vault().total_supply(),
    );

    let token = w.portal.vault_mut().asset_mut();
    token.transfer(root, other, assets).unwrap();
    token.approve(other, pool, assets);

    let (id, shares) = w.portal.deposit(other, assets, owner).unwrap();
    assert_eq!(id, expected_id);
    assert_eq!(shares, expected);
    assert_vault_custody(&w.portal);
    (id, shares)
}

fn contribute(w: &mut World, assets: u64) {
    let before = w.portal.vault().total_assets();
    let supply = w.portal.vault().total_supply();
    w.portal.vault_mut().contribute(w.root, assets).unwrap();
    assert_eq!(w.portal.vault().total_assets(), before + assets);
    assert_eq!(w.portal.vault().total_supply(), supply);
    assert_vault_custody(&w.portal);
}

#[test]
fn configuration_accessors() {
    let w = world();
    let p = &w.portal;
    assert_eq!(p.vault().name(), "XNofee");
    assert_eq!(p.vault().symbol(), "XNOFEE");
    assert_eq!(p.vault().decimals(), 18 + 6);
    assert_eq!(p.asset_address(), p.vault().asset_address());
    assert_eq!(p.vault_address(), p.vault().address());
    assert_eq!(p.offset_unit(), OFFSET);
    assert_eq!(p.decimals_offset(), 6);
    assert_eq!(p.cliff(), w.cliff);
}

#[test]
fn full_lifecycle() {
    let mut w = world();
    let (root, other, owner) = (w.root, w.other, w.owner);

    // First deposit into the empty vault.
    let (id0, shares0) = fund_and_deposit(&mut w, 10_000);
    assert_eq!(shares0, 10_000_000_000);
    assert_eq!(w.portal.balance_of(&owner, &id0), shares0);
    assert_eq!(w.portal.total_balance(&owner), shares0);
    assert_eq!(w.portal.vault().balance_of(&w.portal.address()), shares0);
    assert_eq!(w.portal.vault().total_supply(), shares0);
    assert_eq!(w.portal.vault().total_assets(), 10_000);
    assert_eq!(w.portal.trustee_balance(&owner), 0);

    let err = w
        .portal
        .transform(owner, id0, shares0 / 2, other, owner)
        .unwrap_err();
    assert_eq!(err.to_string(), format!("NotMatured: {id0}"));
    assert_eq!(err.tranche(), Some(id0));

    contribute(&mut w, 100_000);
    assert_eq!(w.portal.vault().total_assets(), 110_000);

    // Owner hands part of the tranche to other.
    let shares4 = 2_500;
    w.portal.transfer(owner, other, id0, shares4).unwrap();
    assert_eq!(w.portal.total_balance(&owner), shares0 - shares4);
    assert_eq!(w.portal.balance_of(&other, &id0), shares4);
    assert_eq!(w.portal.vault().balance_of(&w.portal.address()), shares0);

    contribute(&mut w, 10_000);
    let (id1, shares1) = fund_and_deposit(&mut w, 90_000);
    assert_ne!(id1, id0);
    assert_eq!(w.portal.total_balance(&owner), shares0 + shares1 - shares4);
    assert_eq!(
        w.portal.vault().balance_of(&w.portal.address()),
        shares0 + shares1
    );

    // Root withdraws on the owner's behalf with an exact allowance.
    contribute(&mut w, 120_000);
    let assets5 = 1_050;
    let shares5 = w.portal.preview_withdraw(&id1, assets5).unwrap();
    w.portal.approve(owner, root, id1, shares5);
    assert_eq!(
        w.portal.withdraw(root, id1, assets5, other, owner).unwrap(),
        shares5
    );
    assert_eq!(w.portal.allowance(&owner, &root, &id1), 0);
    assert_eq!(w.portal.balance_of(&owner, &id1), shares1 - shares5);
    assert_eq!(w.portal.vault().asset().balance_of(&other), assets5);
    assert_vault_custody(&w.portal);

    // Allowance is spent: a second withdrawal is unauthorised.
    let err = w.portal.withdraw(root, id1, 1, other, owner).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    contribute(&mut w, 123_000);
    let assets6 = w.portal.preview_redeem(&id0, 170_000_000).unwrap();
    let shares6 = w.portal.preview_withdraw(&id0, assets6).unwrap();
    assert!(shares6 <= 170_000_000);
    w.portal.approve(owner, root, id0, shares6);
    assert_eq!(
        w.portal.withdraw(root, id0, assets6, other, owner).unwrap(),
        shares6
    );
    assert_eq!(
        w.portal.vault().asset().balance_of(&other),
        assets5 + assets6
    );

    contribute(&mut w, 123_000);
    let (id2, shares2) = fund_and_deposit(&mut w, 70_000);
    contribute(&mut w, 123_000);

    let owner_total = shares0 + shares1 + shares2 - shares4 - shares5 - shares6;
    assert_eq!(w.portal.total_balance(&owner), owner_total);

    // Delegation moves every owner share into its trustee.
    w.portal.delegate(owner, root).unwrap();
    assert_eq!(w.portal.trustee_balance(&owner), owner_total);
    assert_eq!(w.portal.total_balance(&owner), owner_total);
    assert_eq!(w.portal.vault().balance_of(&w.portal.address()), shares4);
    let trustee = w.portal.trustee_of(&owner).unwrap().address;
    assert_eq!(w.portal.vault().balance_of(&trustee), owner_total);
    let vault_trustee = w.portal.vault().trustee_of(&trustee).unwrap().address;
    assert_eq!(
        w.portal.vault().asset().delegates(&vault_trustee),
        Some(root)
    );
    assert!(w.portal.vault().total_trusted() > 0);
    assert_vault_custody(&w.portal);

    contribute(&mut w, 10_023_000);

    // The sender's trustee excess returns to the pool on transfer.
    let shares7 = 3_500;
    w.portal.transfer(owner, other, id1, shares7).unwrap();
    assert_eq!(
        w.portal.vault().balance_of(&w.portal.address()),
        shares4 + shares7
    );
    assert_eq!(w.portal.trustee_balance(&owner), owner_total - shares7);
    assert_eq!(w.portal.trustee_balance(&other), 0);
    assert_vault_custody(&w.portal);

    contribute(&mut w, 17_023_000);
    let assets8 = 1_530;
    let shares8 = w.portal.preview_withdraw(&id2, assets8).unwrap();
    w.portal.approve(owner, root, id2, shares8);
    w.portal.withdraw(root, id2, assets8, other, owner).unwrap();
    assert_eq!(
        w.portal.trustee_balance(&owner),
        owner_total - shares7 - shares8
    );
    assert_eq!(
        w.portal.vault().balance_of(&w.portal.address()),
        shares4 + shares7
    );
    assert_vault_custody(&w.portal);

    contribute(&mut w, 7_023_000);
    let shares9 = 159_000_000;
    let assets9 = w.portal.preview_redeem(&id2, shares9).unwrap();
    w.portal.approve(owner, root, id2, shares9);
    assert_eq!(
        w.portal.redeem(root, id2, shares9, other, owner).unwrap(),
        assets9
    );
    assert_eq!(
        w.portal.vault().asset().balance_of(&other),
        assets5 + assets6 + assets8 + assets9
    );
    assert_vault_custody(&w.portal);

    contribute(&mut w, 702_300_050);
    let (id3, shares3) = fund_and_deposit(&mut w, 110_000);
    assert_eq!(
        w.portal.vault().balance_of(&w.portal.address()),
        shares3 + shares4 + shares7
    );
    let delegated = owner_total - shares7 - shares8 - shares9;
    assert_eq!(w.portal.trustee_balance(&owner), delegated);
    assert_eq!(w.portal.total_balance(&owner), delegated + shares3);

    // Past the cliff only transform is allowed.
    w.portal.advance_to(w.cliff).unwrap();
    let balance0 = w.portal.balance_of(&owner, &id0);
    let err = w
        .portal
        .withdraw(owner, id0, 1, other, owner)
        .unwrap_err();
    assert_eq!(err.to_string(), format!("Matured: {id0}"));
    let err = w
        .portal
        .redeem(owner, id0, balance0, other, owner)
        .unwrap_err();
    assert_eq!(err.to_string(), format!("Matured: {id0}"));

    for holder in [owner, other] {
        for id in [id0, id1, id2, id3] {
            let balance = w.portal.balance_of(&holder, &id);
            w.portal.transform(holder, id, balance, holder, holder).unwrap();
            assert_eq!(w.portal.balance_of(&holder, &id), 0);
        }
        assert_eq!(w.portal.total_balance(&holder), 0);
    }
    assert_eq!(w.portal.vault().balance_of(&w.portal.address()), 0);
    assert_eq!(w.portal.trustee_balance(&owner), 0);
    assert_eq!(w.portal.vault().total_trusted(), 0);
    assert_vault_custody(&w.portal);

    // Everyone exits the vault.
    let supply = w.portal.vault().total_supply() as u128;
    let assets = w.portal.vault().total_assets() as u128;
    for holder in [owner, other] {
        let shares = w.portal.vault().balance_of(&holder);
        w.portal
            .vault_mut()
            .redeem(holder, shares, holder, holder)
            .unwrap();
    }
    assert_eq!(w.portal.vault().total_supply(), 0);

    // (S + offset) / (A + 1) before the exits is at least offset / (A_f + 1),
    // and what stays behind is bounded by the virtual shares' entitlement
    // plus one unit per redemption.
    let offset = OFFSET as u128;
    let residual = w.portal.vault().total_assets() as u128;
    assert!((supply + offset) * (residual + 1) >= offset * (assets + 1));
    assert!((supply + offset) * residual.saturating_sub(2) < offset * (assets + 1));
}

#[test]
fn repeated_delegation_updates_target() {
    let mut w = world();
    let (root, owner) = (w.root, w.owner);
    let (_, s0) = fund_and_deposit(&mut w, 50_000);

    w.portal.delegate(owner, root).unwrap();
    let (_, s1) = fund_and_deposit(&mut w, 25_000);
    assert_eq!(w.portal.trustee_balance(&owner), s0);

    w.portal.delegate(owner, owner).unwrap();
    assert_eq!(w.portal.trustee_balance(&owner), s0 + s1);
    assert_eq!(w.portal.trustee_of(&owner).unwrap().delegatee, owner);

    let trustee = w.portal.trustee_of(&owner).unwrap().address;
    let vault_trustee = w.portal.vault().trustee_of(&trustee).unwrap().clone();
    assert_eq!(
        w.portal.vault().asset().delegates(&vault_trustee.address),
        Some(owner)
    );
    assert_eq!(
        vault_trustee.trusted,
        w.portal.vault().convert_to_assets(s0 + s1).unwrap()
    );
    assert_eq!(w.portal.vault().asset().votes(&owner), vault_trustee.trusted);
}

#[test]
fn transfer_from_spends_allowance() {
    let mut w = world();
    let (root, other, owner) = (w.root, w.other, w.owner);
    let (id, shares) = fund_and_deposit(&mut w, 10_000);

    let err = w
        .portal
        .transfer_from(root, owner, other, id, 100)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    w.portal.approve(owner, root, id, 150);
    w.portal.transfer_from(root, owner, other, id, 100).unwrap();
    assert_eq!(w.portal.allowance(&owner, &root, &id), 50);
    assert_eq!(w.portal.balance_of(&other, &id), 100);
    assert_eq!(w.portal.total_balance(&owner), shares - 100);
}

#[test]
fn approved_operator_transforms_after_cliff() {
    let mut w = world();
    let (root, other, owner) = (w.root, w.other, w.owner);
    let (id, shares) = fund_and_deposit(&mut w, 10_000);
    w.portal.delegate(owner, root).unwrap();

    let approved = shares / 2;
    w.portal.approve(owner, root, id, approved);
    w.portal.advance_to(w.cliff).unwrap();
    let before = serde_json::to_value(&w.portal).unwrap();

    // Without an allowance, and with one that is too small.
    let err = w
        .portal
        .transform(other, id, 1, other, owner)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let err = w
        .portal
        .transform(root, id, approved + 1, other, owner)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(serde_json::to_value(&w.portal).unwrap(), before);

    let first = approved / 4;
    w.portal.transform(root, id, first, other, owner).unwrap();
    assert_eq!(w.portal.allowance(&owner, &root, &id), approved - first);
    assert_eq!(w.portal.balance_of(&owner, &id), shares - first);
    assert_eq!(w.portal.trustee_balance(&owner), shares - first);
    assert_eq!(w.portal.vault().balance_of(&other), first);

    w.portal
        .transform(root, id, approved - first, root, owner)
        .unwrap();
    assert_eq!(w.portal.allowance(&owner, &root, &id), 0);
    assert_eq!(w.portal.vault().balance_of(&root), approved - first);
    assert_eq!(w.portal.total_balance(&owner), shares - approved);
    assert_eq!(w.portal.trustee_balance(&owner), shares - approved);
    assert_vault_custody(&w.portal);

    let err = w.portal.transform(root, id, 1, root, owner).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}
